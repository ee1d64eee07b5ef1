use {
    super::{HookId, Stage},
    crate::infra::observe,
    arc_swap::ArcSwap,
    std::{collections::HashMap, sync::Arc, time::Duration},
};

/// Hooks that run concurrently under one timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub timeout: Duration,
    pub hooks: Vec<HookId>,
}

/// `endpoint -> stage -> groups`, groups in execution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan(HashMap<String, HashMap<Stage, Vec<Group>>>);

impl ExecutionPlan {
    pub fn with_group(mut self, endpoint: impl Into<String>, stage: Stage, group: Group) -> Self {
        self.0
            .entry(endpoint.into())
            .or_default()
            .entry(stage)
            .or_default()
            .push(group);
        self
    }

    pub fn groups(&self, endpoint: &str, stage: Stage) -> &[Group] {
        self.0
            .get(endpoint)
            .and_then(|stages| stages.get(&stage))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The host plan plus the plans of individual accounts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Plans {
    pub host: ExecutionPlan,
    /// Used for requests whose account has no plan of its own.
    pub default_account: ExecutionPlan,
    pub accounts: HashMap<String, ExecutionPlan>,
}

impl Plans {
    /// The groups to run for a request. Host groups always run before
    /// account groups.
    pub fn groups(&self, endpoint: &str, account: Option<&str>, stage: Stage) -> Vec<&Group> {
        let account = account
            .and_then(|account| self.accounts.get(account))
            .unwrap_or(&self.default_account);
        self.host
            .groups(endpoint, stage)
            .iter()
            .chain(account.groups(endpoint, stage))
            .collect()
    }
}

/// The currently active plans.
///
/// Auctions take a snapshot when they start; a reload swaps in a new
/// [`Plans`] without affecting auctions already running.
#[derive(Debug)]
pub struct PlanStore(ArcSwap<Plans>);

impl PlanStore {
    pub fn new(plans: Plans) -> Self {
        Self(ArcSwap::from_pointee(plans))
    }

    pub fn snapshot(&self) -> Arc<Plans> {
        self.0.load_full()
    }

    pub fn replace(&self, plans: Plans) {
        observe::plans_replaced(&plans);
        self.0.store(Arc::new(plans));
    }
}
