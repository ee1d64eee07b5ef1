//! Runs the hooks of one stage according to the plans.
//!
//! Groups run one after the other. The hooks of a group run concurrently on
//! a shared snapshot of the payload and are joined against the group
//! deadline. Their changes are then applied in plan order, so when two hooks
//! change the same field the one listed later wins.
//!
//! Each module has a context that lives as long as the auction. Hooks get a
//! copy of their module's context and the entries they return are merged
//! back after their group, in plan order.

use {
    super::{
        ChangeSet,
        HookId,
        HookResult,
        Hooks,
        Invocation,
        ModuleContext,
        Plans,
        Rejection,
        Stage,
        plan::Group,
    },
    crate::{
        domain::{AdapterName, AuctionRequest, auction::Id, time::Deadline},
        infra::observe,
        util::task::{self, Joined},
    },
    futures::{StreamExt, stream::FuturesUnordered},
    serde::Serialize,
    std::{
        collections::HashMap,
        sync::{Arc, Mutex},
        time::Duration,
    },
    tokio::time::Instant,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Status {
    Success,
    TimedOut,
    /// The hook returned an error.
    Failure,
    Panicked,
    /// The hook returned something the engine could not act on: a reject
    /// at a stage that can't be rejected or changes that all failed.
    ExecutionFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    None,
    Update,
    Reject,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutcome {
    pub hook: HookId,
    pub status: Status,
    pub action: Action,
    pub message: Option<String>,
    /// Mutations that could not be applied.
    pub warnings: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupOutcome {
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    /// In plan order. Hooks still pending when the group was rejected are
    /// not listed.
    pub hooks: Vec<HookOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Done,
    Rejected,
    /// The auction deadline passed before all groups could run.
    TimedOut,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StageOutcome {
    pub stage: Stage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub adapter: Option<AdapterName>,
    pub state: StageState,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub groups: Vec<GroupOutcome>,
}

impl StageOutcome {
    pub fn hooks(&self) -> impl Iterator<Item = &HookOutcome> {
        self.groups.iter().flat_map(|group| group.hooks.iter())
    }
}

#[derive(Debug)]
pub struct StageExecution<P> {
    /// The payload after all applied changes. On rejection, the payload as
    /// it was before the rejecting group.
    pub payload: P,
    pub outcome: StageOutcome,
    pub rejection: Option<Rejection>,
}

/// Executes stages for one auction against the plans it started with.
pub struct Executor {
    plans: Arc<Plans>,
    auction: Id,
    endpoint: String,
    account: Option<String>,
    /// By module name.
    contexts: Mutex<HashMap<String, ModuleContext>>,
}

impl Executor {
    pub fn new(plans: Arc<Plans>, request: &AuctionRequest) -> Self {
        Self {
            plans,
            auction: request.id.clone(),
            endpoint: request.endpoint.clone(),
            account: request.account.clone(),
            contexts: Default::default(),
        }
    }

    /// The context `module` has built up so far in this auction.
    fn context(&self, module: &str) -> ModuleContext {
        self.contexts
            .lock()
            .unwrap()
            .get(module)
            .cloned()
            .unwrap_or_default()
    }

    fn remember(&self, module: &str, entries: ModuleContext) {
        if entries.is_empty() {
            return;
        }
        self.contexts
            .lock()
            .unwrap()
            .entry(module.to_owned())
            .or_default()
            .extend(entries);
    }

    pub async fn execute<P>(
        &self,
        stage: Stage,
        hooks: &Hooks<P>,
        payload: P,
        deadline: Deadline,
    ) -> StageExecution<P>
    where
        P: Clone + Send + Sync + 'static,
    {
        self.run(stage, None, hooks, payload, deadline).await
    }

    /// Like [`Executor::execute`], for stages that run once per adapter.
    pub async fn execute_for_adapter<P>(
        &self,
        stage: Stage,
        adapter: &AdapterName,
        hooks: &Hooks<P>,
        payload: P,
        deadline: Deadline,
    ) -> StageExecution<P>
    where
        P: Clone + Send + Sync + 'static,
    {
        self.run(stage, Some(adapter.clone()), hooks, payload, deadline)
            .await
    }

    async fn run<P>(
        &self,
        stage: Stage,
        adapter: Option<AdapterName>,
        hooks: &Hooks<P>,
        mut payload: P,
        deadline: Deadline,
    ) -> StageExecution<P>
    where
        P: Clone + Send + Sync + 'static,
    {
        let start = Instant::now();
        let mut outcome = StageOutcome {
            stage,
            adapter: adapter.clone(),
            state: StageState::Done,
            elapsed: Duration::ZERO,
            groups: vec![],
        };
        let mut rejection = None;

        for group in self
            .plans
            .groups(&self.endpoint, self.account.as_deref(), stage)
        {
            if deadline.is_expired() {
                outcome.state = StageState::TimedOut;
                break;
            }
            let invocation = Invocation {
                auction: self.auction.clone(),
                endpoint: self.endpoint.clone(),
                account: self.account.clone(),
                stage,
                adapter: adapter.clone(),
                deadline: deadline.derive(group.timeout),
                context: ModuleContext::new(),
            };
            let run = self
                .run_group(&invocation, group, hooks, payload, deadline)
                .await;
            payload = run.payload;
            outcome.groups.push(run.outcome);
            if let Some(rejected) = run.rejection {
                outcome.state = StageState::Rejected;
                rejection = Some(rejected);
                break;
            }
        }

        outcome.elapsed = start.elapsed();
        observe::stage_finished(&outcome);
        if let Some(rejection) = &rejection {
            observe::stage_rejected(rejection, adapter.as_ref());
        }
        StageExecution {
            payload,
            outcome,
            rejection,
        }
    }

    async fn run_group<P>(
        &self,
        invocation: &Invocation,
        group: &Group,
        hooks: &Hooks<P>,
        mut payload: P,
        stage_deadline: Deadline,
    ) -> GroupRun<P>
    where
        P: Clone + Send + Sync + 'static,
    {
        let start = Instant::now();
        let stage = invocation.stage;
        let deadline = invocation.deadline;

        let resolved = group
            .hooks
            .iter()
            .filter_map(|id| match hooks.get(id) {
                Some(hook) => Some((id, hook.clone())),
                None => {
                    observe::hook_missing(id, stage);
                    None
                }
            })
            .collect::<Vec<_>>();

        let snapshot = Arc::new(payload.clone());
        let mut pending = resolved
            .iter()
            .enumerate()
            .map(|(i, (id, hook))| {
                let hook = hook.clone();
                let invocation = Invocation {
                    context: self.context(&id.module),
                    ..invocation.clone()
                };
                let snapshot = snapshot.clone();
                let started = Instant::now();
                let handle =
                    task::spawn_isolated(async move { hook.handle(&invocation, snapshot).await });
                async move {
                    let joined = task::join_until(handle, deadline).await;
                    (i, joined, started.elapsed())
                }
            })
            .collect::<FuturesUnordered<_>>();

        let mut finished: Vec<Option<Finished<P>>> = resolved.iter().map(|_| None).collect();
        let mut rejected = false;
        while let Some((i, joined, elapsed)) = pending.next().await {
            rejected = stage.is_rejectable()
                && matches!(&joined, Joined::Done(Ok(result)) if result.reject);
            finished[i] = Some((joined, elapsed));
            if rejected {
                break;
            }
        }
        // Hooks still running are detached, their results are never looked at.
        drop(pending);

        let mut outcomes = Vec::with_capacity(finished.len());
        let mut rejection = None;
        for ((id, _), slot) in resolved.iter().zip(finished) {
            let Some((joined, elapsed)) = slot else {
                continue;
            };
            let mut outcome = HookOutcome {
                hook: (*id).clone(),
                status: Status::Success,
                action: Action::None,
                message: None,
                warnings: vec![],
                elapsed,
            };
            match joined {
                Joined::TimedOut => outcome.status = Status::TimedOut,
                Joined::Panicked(panic) => {
                    outcome.status = Status::Panicked;
                    outcome.message = Some(panic.0);
                }
                Joined::Done(Err(err)) => {
                    outcome.status = Status::Failure;
                    outcome.message = Some(format!("{err:#}"));
                }
                Joined::Done(Ok(result)) => {
                    self.remember(&id.module, result.context);
                    outcome.message = result.message;
                    if result.reject && stage.is_rejectable() {
                        outcome.action = Action::Reject;
                        rejection = Some(Rejection {
                            stage,
                            hook: outcome.hook.clone(),
                            message: outcome.message.clone(),
                        });
                    } else if result.reject {
                        outcome.status = Status::ExecutionFailure;
                        outcome
                            .warnings
                            .push(format!("rejection is not allowed at stage {stage}"));
                    } else if !result.changes.is_empty() {
                        outcome.action = Action::Update;
                        if rejected {
                            outcome
                                .warnings
                                .push("changes discarded, the group was rejected".to_owned());
                        } else {
                            apply(&mut payload, result.changes, &mut outcome, stage_deadline).await;
                        }
                    }
                }
            }
            observe::hook_invoked(stage, &outcome);
            outcomes.push(outcome);
        }

        GroupRun {
            payload,
            outcome: GroupOutcome {
                timeout: group.timeout,
                elapsed: start.elapsed(),
                hooks: outcomes,
            },
            rejection,
        }
    }
}

struct GroupRun<P> {
    payload: P,
    outcome: GroupOutcome,
    rejection: Option<Rejection>,
}

type Finished<P> = (Joined<anyhow::Result<HookResult<P>>>, Duration);

/// Applies changes on the blocking pool, giving up at `deadline`. A change
/// that fails leaves the payload as it was before that change.
async fn apply<P>(
    payload: &mut P,
    changes: ChangeSet<P>,
    outcome: &mut HookOutcome,
    deadline: Deadline,
) where
    P: Clone + Send + 'static,
{
    let base = payload.clone();
    let handle = task::spawn_blocking_isolated(move || apply_all(base, changes));
    match task::join_until(handle, deadline).await {
        Joined::Done(applied) => {
            *payload = applied.payload;
            outcome.warnings.extend(applied.warnings);
            if applied.all_failed {
                outcome.status = Status::ExecutionFailure;
            }
        }
        Joined::Panicked(panic) => {
            outcome.status = Status::ExecutionFailure;
            outcome.warnings.push(format!("failed to apply changes: {panic}"));
        }
        Joined::TimedOut => {
            outcome.status = Status::TimedOut;
            outcome
                .warnings
                .push("changes were not applied before the deadline".to_owned());
        }
    }
}

struct Applied<P> {
    payload: P,
    warnings: Vec<String>,
    all_failed: bool,
}

fn apply_all<P: Clone>(mut payload: P, changes: ChangeSet<P>) -> Applied<P> {
    let total = changes.len();
    let mut warnings = Vec::new();
    for mutation in changes {
        let key = mutation.key.clone();
        let mut next = payload.clone();
        let error = match task::catch(|| mutation.apply(&mut next)) {
            Ok(Ok(())) => {
                payload = next;
                continue;
            }
            Ok(Err(err)) => format!("{err:#}"),
            Err(panic) => panic.to_string(),
        };
        warnings.push(format!("failed to apply {key}: {error}"));
    }
    Applied {
        payload,
        all_failed: warnings.len() == total,
        warnings,
    }
}
