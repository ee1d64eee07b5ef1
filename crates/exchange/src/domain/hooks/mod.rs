//! Pluggable interception points of the auction pipeline.
//!
//! A hook is owned by a module and registered for one stage. Which hooks run
//! for a request, in which order and under which timeouts is decided by the
//! [`plan::Plans`], never by the hooks themselves.

use {
    crate::domain::{
        AdapterName,
        AuctionRequest,
        TypedBid,
        aggregation::AuctionOutcome,
        auction::Id,
        time::Deadline,
    },
    serde::{Deserialize, Serialize},
    std::{collections::HashMap, fmt, sync::Arc},
};

pub mod engine;
pub mod plan;

pub use {
    engine::{Action, HookOutcome, StageExecution, StageOutcome, Status},
    plan::{ExecutionPlan, Group, PlanStore, Plans},
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HookId {
    pub module: String,
    pub hook: String,
}

impl HookId {
    pub fn new(module: impl Into<String>, hook: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            hook: hook.into(),
        }
    }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.module, self.hook)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Stage {
    Entrypoint,
    RawAuctionRequest,
    RawBidderResponse,
    AllProcessedBidResponses,
    AuctionResponse,
}

impl Stage {
    /// Whether a hook may reject the auction (or the adapter) at this stage.
    /// The response is already decided at `auction-response`.
    pub fn is_rejectable(self) -> bool {
        !matches!(self, Self::AuctionResponse)
    }
}

/// Free-form state a module keeps for the length of one auction. Every hook
/// of the module sees what earlier hooks of the same module left in it.
pub type ModuleContext = serde_json::Map<String, serde_json::Value>;

/// The context a hook is invoked with.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub auction: Id,
    pub endpoint: String,
    pub account: Option<String>,
    pub stage: Stage,
    /// Set for `raw-bidder-response`.
    pub adapter: Option<AdapterName>,
    /// The group deadline. A hook still running past it is abandoned.
    pub deadline: Deadline,
    /// A copy of the hook's module context as of the start of its group.
    pub context: ModuleContext,
}

#[async_trait::async_trait]
pub trait Hook<P>: Send + Sync
where
    P: Send + Sync + 'static,
{
    /// Inspects a snapshot of the stage payload. Changes are returned as a
    /// [`ChangeSet`] and applied by the engine, never in place.
    async fn handle(
        &self,
        invocation: &Invocation,
        payload: Arc<P>,
    ) -> anyhow::Result<HookResult<P>>;
}

pub struct HookResult<P> {
    pub reject: bool,
    pub message: Option<String>,
    pub changes: ChangeSet<P>,
    /// Entries merged into the module context once the group is done.
    pub context: ModuleContext,
}

impl<P> HookResult<P> {
    pub fn noop() -> Self {
        Self {
            reject: false,
            message: None,
            changes: ChangeSet::default(),
            context: ModuleContext::new(),
        }
    }

    pub fn reject(message: impl Into<String>) -> Self {
        Self {
            reject: true,
            message: Some(message.into()),
            changes: ChangeSet::default(),
            context: ModuleContext::new(),
        }
    }

    pub fn update(changes: ChangeSet<P>) -> Self {
        Self {
            reject: false,
            message: None,
            changes,
            context: ModuleContext::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Remembers `value` under `key` for later hooks of the same module.
    pub fn remember(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MutationKind {
    Update,
    Delete,
}

type Apply<P> = Box<dyn FnOnce(&mut P) -> anyhow::Result<()> + Send>;

/// One keyed change to a payload.
pub struct Mutation<P> {
    pub kind: MutationKind,
    /// Dotted path of what is changed, for the trace.
    pub key: String,
    apply: Apply<P>,
}

impl<P> Mutation<P> {
    pub fn apply(self, payload: &mut P) -> anyhow::Result<()> {
        (self.apply)(payload)
    }
}

/// Ordered list of changes a hook wants to make.
pub struct ChangeSet<P>(Vec<Mutation<P>>);

impl<P> Default for ChangeSet<P> {
    fn default() -> Self {
        Self(Vec::new())
    }
}

impl<P> ChangeSet<P> {
    pub fn update(
        self,
        key: impl Into<String>,
        apply: impl FnOnce(&mut P) -> anyhow::Result<()> + Send + 'static,
    ) -> Self {
        self.push(MutationKind::Update, key.into(), Box::new(apply))
    }

    pub fn delete(
        self,
        key: impl Into<String>,
        apply: impl FnOnce(&mut P) -> anyhow::Result<()> + Send + 'static,
    ) -> Self {
        self.push(MutationKind::Delete, key.into(), Box::new(apply))
    }

    fn push(mut self, kind: MutationKind, key: String, apply: Apply<P>) -> Self {
        self.0.push(Mutation { kind, key, apply });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<P> IntoIterator for ChangeSet<P> {
    type IntoIter = std::vec::IntoIter<Mutation<P>>;
    type Item = Mutation<P>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// The hooks registered for one stage, by id.
pub struct Hooks<P: Send + Sync + 'static>(HashMap<HookId, Arc<dyn Hook<P>>>);

impl<P: Send + Sync + 'static> Default for Hooks<P> {
    fn default() -> Self {
        Self(HashMap::new())
    }
}

impl<P: Send + Sync + 'static> Hooks<P> {
    pub fn with(mut self, id: HookId, hook: Arc<dyn Hook<P>>) -> Self {
        self.0.insert(id, hook);
        self
    }

    pub fn get(&self, id: &HookId) -> Option<&Arc<dyn Hook<P>>> {
        self.0.get(id)
    }
}

/// The bids of one adapter, as seen by `raw-bidder-response` hooks.
#[derive(Debug, Clone, PartialEq)]
pub struct BidderResponse {
    pub adapter: AdapterName,
    pub bids: Vec<TypedBid>,
}

/// Every hook the exchange knows about, per stage. Built at startup and
/// shared read-only between auctions.
#[derive(Default)]
pub struct Repository {
    pub entrypoint: Hooks<AuctionRequest>,
    pub raw_auction_request: Hooks<AuctionRequest>,
    pub raw_bidder_response: Hooks<BidderResponse>,
    pub all_processed_bid_responses: Hooks<AuctionOutcome>,
    pub auction_response: Hooks<AuctionOutcome>,
}

/// Why a stage stopped the auction (or vetoed an adapter).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub stage: Stage,
    pub hook: HookId,
    pub message: Option<String>,
}
