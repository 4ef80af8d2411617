// Library exports for cohortviz

pub mod debounce;
pub mod encoding;
pub mod heatmap;
pub mod labels;
pub mod normalize;
pub mod palette;
pub mod query;
pub mod runtime;
pub mod schema;
pub mod series;
pub mod store;
