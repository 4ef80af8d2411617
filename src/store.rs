// Observable encoding state shared by the explorer views.
//
// Every mutation replaces the whole snapshot and notifies subscribers
// synchronously, so readers never observe a torn state. Validation happens
// before the swap: a rejected mutation leaves the state untouched.

use anyhow::{bail, Result};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

use crate::encoding::{AxisSlot, ChartEncoding, ChartType, Filter};
use crate::query::Row;
use crate::schema::Variable;

type Listener = Box<dyn Fn(&ChartEncoding)>;

/// Handle for dropping a subscription; views unsubscribe on teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Process-wide container for the current chart encoding plus the rows
/// backing the current chart.
pub struct EncodingStore {
    state: Rc<ChartEncoding>,
    data: Rc<Vec<Row>>,
    listeners: RefCell<Vec<(SubscriptionId, Listener)>>,
    next_id: u64,
}

impl Default for EncodingStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodingStore {
    pub fn new() -> Self {
        EncodingStore {
            state: Rc::new(ChartEncoding::default()),
            data: Rc::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
            next_id: 0,
        }
    }

    /// Current immutable snapshot.
    pub fn snapshot(&self) -> Rc<ChartEncoding> {
        Rc::clone(&self.state)
    }

    pub fn data(&self) -> Rc<Vec<Row>> {
        Rc::clone(&self.data)
    }

    pub fn subscribe(&mut self, listener: impl Fn(&ChartEncoding) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.listeners.borrow_mut().push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.listeners.borrow_mut().retain(|(lid, _)| *lid != id);
    }

    fn replace(&mut self, next: ChartEncoding) {
        self.state = Rc::new(next);
        self.notify();
    }

    fn notify(&self) {
        for (_, listener) in self.listeners.borrow().iter() {
            listener(&self.state);
        }
    }

    pub fn set_chart_type(&mut self, chart_type: ChartType) {
        let mut next = (*self.state).clone();
        next.chart_type = chart_type;
        self.replace(next);
    }

    /// Bind a variable to an axis. X and Y hold one variable (assignment
    /// replaces); color and size append. Y rejects non-numeric variables,
    /// color rejects ineligible ones.
    pub fn add_variable(&mut self, slot: AxisSlot, variable: Variable) -> Result<()> {
        match slot {
            AxisSlot::Y if !variable.is_numeric() => {
                bail!("El eje Y solo acepta variables numéricas");
            }
            AxisSlot::Color if !variable.eligible_for_color => {
                bail!("Color solo acepta variables categóricas o con pocos valores únicos");
            }
            _ => {}
        }

        debug!(axis = ?slot, variable = %variable.name, "binding variable");
        let mut next = (*self.state).clone();
        match slot {
            AxisSlot::X => next.x_axis = vec![variable],
            AxisSlot::Y => {
                // Default metric on drop is AVG
                let metric = variable.effective_metric();
                next.y_axis = vec![variable.with_metric(metric)];
            }
            AxisSlot::Color => next.color.push(variable),
            AxisSlot::Size => next.size.push(variable),
        }
        self.replace(next);
        Ok(())
    }

    pub fn remove_variable(&mut self, slot: AxisSlot, name: &str) {
        let mut next = (*self.state).clone();
        let axis = match slot {
            AxisSlot::X => &mut next.x_axis,
            AxisSlot::Y => &mut next.y_axis,
            AxisSlot::Color => &mut next.color,
            AxisSlot::Size => &mut next.size,
        };
        axis.retain(|v| v.name != name);
        self.replace(next);
    }

    /// Change the metric of the current Y variable. No-op without one.
    pub fn set_metric(&mut self, metric: crate::encoding::Metric) {
        if self.state.y_axis.is_empty() {
            return;
        }
        let mut next = (*self.state).clone();
        next.y_axis[0].metric = Some(metric);
        self.replace(next);
    }

    /// Add a filter; an existing filter on the same column is replaced.
    pub fn add_filter(&mut self, filter: Filter) -> Result<()> {
        filter.validate()?;
        let mut next = (*self.state).clone();
        next.filters.retain(|f| f.column != filter.column);
        next.filters.push(filter);
        self.replace(next);
        Ok(())
    }

    pub fn remove_filter(&mut self, column: &str) {
        let mut next = (*self.state).clone();
        next.filters.retain(|f| f.column != column);
        self.replace(next);
    }

    pub fn clear_filters(&mut self) {
        let mut next = (*self.state).clone();
        next.filters.clear();
        self.replace(next);
    }

    /// Replace the rows backing the current chart. Subscribers are notified
    /// like any other mutation so views re-read the data through `data()`.
    pub fn set_data(&mut self, rows: Vec<Row>) {
        self.data = Rc::new(rows);
        self.notify();
    }

    pub fn reset(&mut self) {
        self.data = Rc::new(Vec::new());
        self.replace(ChartEncoding::default());
    }
}
