use crate::aggregator::AggregatedTree;
use crate::aging::DaysPanel;
use crate::error::Result;
use crate::pivot::{ColumnDescriptor, NodeView, PivotState};
use crate::reference::{reference_options, ReferenceSelection};
use crate::schema::{EngineConfig, HierarchyView, Indicator, LedgerRow};
use crate::AgingPipeline;
use chrono::NaiveDate;
use log::{debug, info};

/// Supplies the rows of one project/indicator. Implemented by the host application.
pub trait RowSource {
    fn fetch_rows(&self, project_id: &str, indicator: Indicator) -> Result<Vec<LedgerRow>>;
}

/// Identifies one fetch. Only the most recently issued ticket is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTicket {
    pub id: u64,
    pub project_id: String,
    pub indicator: Indicator,
}

/// Monotonic request counter implementing "last request wins".
#[derive(Debug, Clone, Default)]
pub struct RequestGuard {
    latest: u64,
}

impl RequestGuard {
    pub fn issue(&mut self) -> u64 {
        self.latest += 1;
        self.latest
    }

    pub fn is_current(&self, id: u64) -> bool {
        id == self.latest
    }
}

/// Dashboard state for one user: which ledger is loaded, the snapshot being
/// viewed and the pivot/expand state.
#[derive(Debug, Clone)]
pub struct LedgerSession {
    config: EngineConfig,
    project_id: Option<String>,
    indicator: Indicator,
    view: HierarchyView,
    guard: RequestGuard,
    pending: Option<u64>,
    rows: Vec<LedgerRow>,
    selection: ReferenceSelection,
    pivot: PivotState,
}

impl LedgerSession {
    pub fn new(indicator: Indicator) -> Self {
        Self::with_config(indicator, EngineConfig::for_indicator(indicator))
    }

    /// Uses `config` for labels and fallback; dimensions follow the indicator's views.
    pub fn with_config(indicator: Indicator, mut config: EngineConfig) -> Self {
        config.dimensions = indicator.structure();
        Self {
            config,
            project_id: None,
            indicator,
            view: HierarchyView::Structure,
            guard: RequestGuard::default(),
            pending: None,
            rows: Vec::new(),
            selection: ReferenceSelection::All,
            pivot: PivotState::new(),
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    pub fn indicator(&self) -> Indicator {
        self.indicator
    }

    pub fn view(&self) -> HierarchyView {
        self.view
    }

    pub fn rows(&self) -> &[LedgerRow] {
        &self.rows
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn selection(&self) -> ReferenceSelection {
        self.selection
    }

    pub fn pivot(&self) -> &PivotState {
        &self.pivot
    }

    pub fn pivot_mut(&mut self) -> &mut PivotState {
        &mut self.pivot
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Starts loading a (project, indicator). Switching either one resets the
    /// pivot state, the view and the snapshot selection.
    pub fn select(&mut self, project_id: &str, indicator: Indicator) -> FetchTicket {
        let changed =
            self.project_id.as_deref() != Some(project_id) || self.indicator != indicator;

        if changed {
            info!(
                "Switching ledger to project {} ({:?})",
                project_id, indicator
            );
            self.project_id = Some(project_id.to_string());
            self.indicator = indicator;
            self.view = HierarchyView::Structure;
            self.config.dimensions = indicator.structure();
            self.rows.clear();
            self.selection = ReferenceSelection::All;
            self.pivot.reset();
        }

        let id = self.guard.issue();
        self.pending = Some(id);
        FetchTicket {
            id,
            project_id: project_id.to_string(),
            indicator,
        }
    }

    /// Applies a fetch result. Stale tickets are ignored and return `Ok(false)`.
    pub fn complete(&mut self, ticket: &FetchTicket, result: Result<Vec<LedgerRow>>) -> Result<bool> {
        if !self.guard.is_current(ticket.id) {
            debug!(
                "Ignoring stale response {} for project {}",
                ticket.id, ticket.project_id
            );
            return Ok(false);
        }

        self.pending = None;
        let rows = result?;
        info!(
            "Loaded {} row(s) for project {} ({:?})",
            rows.len(),
            ticket.project_id,
            ticket.indicator
        );
        self.rows = rows;
        Ok(true)
    }

    /// Selects and fetches synchronously from `source`.
    pub fn load<S: RowSource + ?Sized>(
        &mut self,
        source: &S,
        project_id: &str,
        indicator: Indicator,
    ) -> Result<bool> {
        let ticket = self.select(project_id, indicator);
        let result = source.fetch_rows(project_id, indicator);
        self.complete(&ticket, result)
    }

    pub fn set_view(&mut self, view: HierarchyView) -> Result<()> {
        self.config.dimensions = self.indicator.dimensions_for(view)?;
        self.view = view;
        Ok(())
    }

    pub fn set_selection(&mut self, selection: ReferenceSelection) {
        self.selection = selection;
    }

    pub fn reference_options(&self) -> Vec<NaiveDate> {
        reference_options(&self.rows)
    }

    /// Runs the pipeline over the current rows and selection.
    pub fn report(&self) -> AggregatedTree {
        AgingPipeline::new(&self.config).run(&self.rows, self.selection)
    }

    pub fn columns(&self, tree: &AggregatedTree) -> Vec<ColumnDescriptor> {
        self.pivot.columns(&tree.buckets)
    }

    pub fn visible_nodes<'t>(&self, tree: &'t AggregatedTree) -> Vec<NodeView<'t>> {
        self.pivot.visible_nodes(tree)
    }

    /// Days breakdowns of the node at `path` for every open, visible bucket.
    /// Buckets with no rows under the node are left out.
    pub fn days_panels(&self, tree: &AggregatedTree, path: &[String]) -> Result<Vec<DaysPanel>> {
        let pipeline = AgingPipeline::new(&self.config);
        let mut panels = Vec::new();

        for (axis, bucket) in self.pivot.visible_days(&tree.buckets) {
            let slices = pipeline.days_breakdown(&self.rows, tree, path, axis, &bucket)?;
            if !slices.is_empty() {
                panels.push(DaysPanel {
                    axis,
                    bucket,
                    slices,
                });
            }
        }
        Ok(panels)
    }
}
