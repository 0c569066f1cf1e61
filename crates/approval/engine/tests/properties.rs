//! Property tests over generated chains of varying length.

use approval_engine::*;
use proptest::prelude::*;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Helpers / Strategies
// ---------------------------------------------------------------------------

/// A catalog with `chain_len` chain stages (initial + reviewers), the
/// approved stage, and optionally a rejected stage and a divider row.
fn make_catalog(chain_len: u32, with_rejected: bool, with_divider: bool) -> StatusCatalog {
    let wt = WorkflowType::device_request();
    let mut stages = Vec::new();
    for seq in 1..=chain_len {
        let code = if seq == 1 {
            "initial".to_string()
        } else {
            format!("review_{}", seq - 1)
        };
        stages.push(Stage::new(StageId(seq), wt.clone(), code, seq).with_name("en", format!("Stage {}", seq)));
    }
    stages.push(
        Stage::new(StageId(chain_len + 1), wt.clone(), "approved", chain_len + 1)
            .with_name("en", "Approved")
            .terminal_approved(),
    );
    if with_rejected {
        stages.push(
            Stage::new(StageId(chain_len + 2), wt.clone(), "rejected", chain_len + 2)
                .with_name("en", "Rejected")
                .terminal_rejected(),
        );
    }
    if with_divider {
        stages.push(Stage::new(StageId(1000), wt, "divider", 1000).placeholder());
    }
    StatusCatalog::new(stages).unwrap()
}

fn make_engine(
    catalog: StatusCatalog,
    policy: RejectPolicy,
    oracle: Arc<dyn CapabilityOracle>,
) -> WorkflowEngine {
    let definition = WorkflowDefinition::from_policy(Arc::new(catalog), &ChainPolicy::new(policy))
        .unwrap();
    WorkflowEngine::new(
        Arc::new(definition),
        oracle,
        Arc::new(InMemoryAuditLog::new()),
        EngineSettings::default(),
    )
}

fn allow_all() -> Arc<dyn CapabilityOracle> {
    Arc::new(|_: &ActorId, _: &Capability| true)
}

fn deny_all() -> Arc<dyn CapabilityOracle> {
    Arc::new(|_: &ActorId, _: &Capability| false)
}

fn arb_policy() -> impl Strategy<Value = RejectPolicy> {
    prop_oneof![
        Just(RejectPolicy::RestartFromFirstReviewer),
        Just(RejectPolicy::StepBack),
    ]
}

fn instance_at(stage: u32) -> WorkflowInstance {
    WorkflowInstance::new(
        InstanceId::new("prop"),
        WorkflowType::device_request(),
        StageId(stage),
        ActorId::new("applicant"),
    )
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    /// The forward chain is monotonic with no gaps.
    #[test]
    fn next_stage_is_always_sequence_plus_one(
        chain_len in 2u32..10,
        with_rejected in any::<bool>(),
        with_divider in any::<bool>(),
        policy in arb_policy(),
    ) {
        let engine = make_engine(make_catalog(chain_len, with_rejected, with_divider), policy, allow_all());
        let definition = engine.definition();
        let wt = WorkflowType::device_request();

        for stage in definition.catalog().chain_stages(&wt).unwrap() {
            let next = definition.next_stage(&wt, stage.id).unwrap().unwrap();
            prop_assert_eq!(next.sequence_number, stage.sequence_number + 1);
        }
    }

    /// Terminal stages refuse every transition whatever the actor holds.
    #[test]
    fn terminal_stages_refuse_everything(
        chain_len in 2u32..10,
        actor in "[a-z]{1,12}",
    ) {
        let engine = make_engine(make_catalog(chain_len, true, false), RejectPolicy::default(), allow_all());
        let actor = ActorId::new(actor);

        for terminal in [chain_len + 1, chain_len + 2] {
            let mut inst = instance_at(terminal);
            prop_assert!(!engine.can_approve(&inst, &actor));
            prop_assert!(!engine.can_reject(&inst, &actor));

            let err = engine.approve(&mut inst, &actor, None).unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::InvalidState);
            let err = engine.reject(&mut inst, &actor, "no").unwrap_err();
            prop_assert_eq!(err.kind(), ErrorKind::InvalidState);
        }
    }

    /// Under the default policy later rejections land on the first reviewer
    /// and a first-reviewer rejection is final.
    #[test]
    fn rejection_restarts_from_first_reviewer(
        chain_len in 3u32..10,
        pick in any::<prop::sample::Index>(),
        note in "[a-z ]{0,20}[a-z]",
    ) {
        let engine = make_engine(make_catalog(chain_len, true, false), RejectPolicy::RestartFromFirstReviewer, allow_all());
        let actor = ActorId::new("reviewer");

        let mut first = instance_at(2);
        engine.reject(&mut first, &actor, &note).unwrap();
        prop_assert_eq!(first.current_stage_id, StageId(chain_len + 2));

        // review stages after the first: sequence 3..=chain_len
        let later: Vec<u32> = (3..=chain_len).collect();
        let from = *pick.get(&later);
        let mut inst = instance_at(from);
        engine.reject(&mut inst, &actor, &note).unwrap();
        prop_assert_eq!(inst.current_stage_id, StageId(2));
        prop_assert_eq!(inst.rejection_note.as_deref(), Some(note.trim()));
    }

    /// A denied approval leaves stage, note and modification stamp alone.
    #[test]
    fn denied_approval_changes_nothing(
        chain_len in 2u32..10,
        pick in any::<prop::sample::Index>(),
        note in proptest::option::of("[a-z]{1,20}"),
    ) {
        let engine = make_engine(make_catalog(chain_len, true, true), RejectPolicy::default(), deny_all());
        let actor = ActorId::new("nobody");

        let chain: Vec<u32> = (1..=chain_len).collect();
        let mut inst = instance_at(*pick.get(&chain));
        let before = inst.clone();

        let err = engine.approve(&mut inst, &actor, note.as_deref()).unwrap_err();
        let is_denied = matches!(err, ApprovalError::PermissionDenied { .. });
        prop_assert!(is_denied);
        prop_assert_eq!(inst.current_stage_id, before.current_stage_id);
        prop_assert_eq!(inst.approval_note, before.approval_note);
        prop_assert_eq!(inst.modified_at, before.modified_at);
    }

    /// Blank rejection notes fail validation at every stage, before any
    /// other check.
    #[test]
    fn blank_rejection_note_is_always_validation_error(
        chain_len in 2u32..10,
        stage_offset in 0u32..12,
        blank in "[ \t\n]{0,6}",
        allowed in any::<bool>(),
    ) {
        let oracle = if allowed { allow_all() } else { deny_all() };
        let engine = make_engine(make_catalog(chain_len, true, false), RejectPolicy::default(), oracle);

        let mut inst = instance_at(1 + stage_offset);
        let before = inst.clone();
        let err = engine.reject(&mut inst, &ActorId::new("reviewer"), &blank).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::ValidationError);
        prop_assert_eq!(inst, before);
    }

    /// With full capabilities, repeated approval always ends at the approved
    /// stage after exactly `chain_len` steps.
    #[test]
    fn repeated_approval_reaches_approved(chain_len in 2u32..10, policy in arb_policy()) {
        let engine = make_engine(make_catalog(chain_len, true, true), policy, allow_all());
        let actor = ActorId::new("reviewer");
        let mut inst = engine
            .submit(InstanceId::new("p"), &WorkflowType::device_request(), &actor)
            .unwrap();

        let mut steps = 0;
        while engine.can_approve(&inst, &actor) {
            engine.approve(&mut inst, &actor, None).unwrap();
            steps += 1;
        }
        prop_assert_eq!(steps, chain_len);
        prop_assert_eq!(inst.current_stage_id, StageId(chain_len + 1));
        prop_assert_eq!(inst.version, u64::from(chain_len));
    }
}
