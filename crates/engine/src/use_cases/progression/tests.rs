use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use saga_domain::{
    Ability, AbilityScores, BabProgression, CharacterId, CharacterSnapshot, ChoiceSlot,
    ClassDefinition, Collection, DefenseBonuses, Delta, FeatDefinition, InMemoryCatalog,
    LevelChoices, LevelGrant, MissingSelection, Modifier, ModifierSource, ProgressionError,
    ProgressionIntent, ProgressionResolver, RequirementExpression as R, Ruleset, SkillDefinition,
    StateVersion, Statistic, TalentDefinition, TalentTree,
};

use super::*;
use crate::infrastructure::clock::FixedClock;
use crate::infrastructure::memory_store::{InMemoryCharacterStore, InMemoryModifierStore};
use crate::infrastructure::ports::{
    CommitError, MockCharacterRecordRepo, MockClockPort, MockModifierProvider, RepoError,
};

// =============================================================================
// Fixtures
// =============================================================================

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new()
        .with_class(
            ClassDefinition::new("scout", "Scout", 8, BabProgression::ThreeQuarter)
                .with_defenses(DefenseBonuses::new(2, 1, 0))
                .with_class_skills(["stealth", "perception"])
                .with_trained_skills(2)
                .with_starting_feat("weapon_proficiency_pistols")
                .with_bonus_feat("dodge")
                .with_talent_tree("awareness")
                .with_grant(LevelGrant::new(1, 1, 0))
                .with_grant(LevelGrant::new(2, 1, 0))
                .with_grant(LevelGrant::new(3, 0, 1)),
        )
        .with_feat(FeatDefinition::new(
            "weapon_proficiency_pistols",
            "Weapon Proficiency (Pistols)",
        ))
        .with_feat(FeatDefinition::new("dodge", "Dodge").with_prerequisites(R::ability(Ability::Dex, 13)))
        .with_skill(SkillDefinition::new("stealth", "Stealth", Ability::Dex))
        .with_skill(SkillDefinition::new("perception", "Perception", Ability::Wis))
        .with_talent_tree(TalentTree::new("awareness", "Awareness"))
        .with_talent(TalentDefinition::new("acute_senses", "Acute Senses", "awareness"))
        .with_talent(
            TalentDefinition::new("expert_tracker", "Expert Tracker", "awareness")
                .with_prerequisites(R::talent("acute_senses")),
        )
}

fn level_one_scout() -> CharacterSnapshot {
    let abilities = AbilityScores::new()
        .with(Ability::Dex, 14)
        .with(Ability::Con, 12)
        .with(Ability::Wis, 13);
    CharacterSnapshot::new(CharacterId::new(), abilities)
        .with_class_level("scout", LevelChoices::default())
        .with_feat("weapon_proficiency_pistols")
        .with_trained_skill("stealth")
        .with_version(StateVersion::new(7))
}

fn level_two_intent() -> ProgressionIntent {
    ProgressionIntent::new("scout", 2).with_talent("acute_senses")
}

fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0)
        .single()
        .unwrap()
}

struct Harness {
    use_cases: ProgressionUseCases,
    store: Arc<InMemoryCharacterStore>,
    modifiers: Arc<InMemoryModifierStore>,
}

fn harness(snapshot: &CharacterSnapshot) -> Harness {
    let store = Arc::new(InMemoryCharacterStore::new());
    store.seed(snapshot.clone());
    let modifiers = Arc::new(InMemoryModifierStore::new());
    let use_cases = ProgressionUseCases::new(
        store.clone(),
        modifiers.clone(),
        Arc::new(FixedClock(fixed_time())),
        Arc::new(catalog()),
        Arc::new(Ruleset::default()),
    );
    Harness {
        use_cases,
        store,
        modifiers,
    }
}

fn clock() -> Arc<MockClockPort> {
    let mut clock = MockClockPort::new();
    clock.expect_now().returning(fixed_time);
    Arc::new(clock)
}

fn no_modifiers() -> MockModifierProvider {
    let mut modifiers = MockModifierProvider::new();
    modifiers
        .expect_active_modifiers()
        .returning(|_| Ok(Vec::new()));
    modifiers
}

fn mocked(records: MockCharacterRecordRepo, modifiers: MockModifierProvider) -> ProgressionUseCases {
    ProgressionUseCases::new(
        Arc::new(records),
        Arc::new(modifiers),
        clock(),
        Arc::new(catalog()),
        Arc::new(Ruleset::default()),
    )
}

/// A record repo that serves `snapshot` and commits onto it.
fn serving(snapshot: &CharacterSnapshot) -> MockCharacterRecordRepo {
    let mut records = MockCharacterRecordRepo::new();
    let id = snapshot.id();
    let stored = snapshot.clone();
    records
        .expect_get()
        .withf(move |requested| *requested == id)
        .returning(move |_| Ok(Some(stored.clone())));
    let stored = snapshot.clone();
    records
        .expect_commit()
        .returning(move |delta| delta.commit_onto(&stored).map_err(CommitError::from));
    records
}

// =============================================================================
// Level up
// =============================================================================

#[tokio::test]
async fn level_two_scout_gains_talent_and_one_version() {
    let snapshot = level_one_scout();
    let h = harness(&snapshot);

    let applied = h
        .use_cases
        .level_up(snapshot.id(), &level_two_intent())
        .await
        .unwrap();

    assert_eq!(applied.new_version, StateVersion::new(8));
    assert_eq!(applied.committed_at, fixed_time());
    let derived = applied.derived.as_ref().unwrap();
    assert_eq!(derived.character_level, 2);
    assert_eq!(derived.base_attack, 1);
    assert!(applied.is_consistent());

    let stored = h.store.get(snapshot.id()).await.unwrap().unwrap();
    assert_eq!(stored.version(), StateVersion::new(8));
    assert!(stored.owns_talent(&"acute_senses".into()));
    assert_eq!(stored.class_history().len(), 2);
}

#[tokio::test]
async fn missing_talent_is_incomplete_and_nothing_changes() {
    let snapshot = level_one_scout();
    let h = harness(&snapshot);

    let result = h
        .use_cases
        .level_up(snapshot.id(), &ProgressionIntent::new("scout", 2))
        .await;

    match result {
        Err(ProgressionUseCaseError::Progression(ProgressionError::IncompleteIntent(missing))) => {
            assert_eq!(missing, vec![MissingSelection::new(ChoiceSlot::Talent, 1, 0)]);
        }
        other => panic!("expected incomplete intent, got {other:?}"),
    }
    assert_eq!(h.store.get(snapshot.id()).await.unwrap(), Some(snapshot));
}

#[tokio::test]
async fn unmet_prerequisite_reports_clause_and_nothing_changes() {
    let snapshot = level_one_scout();
    let h = harness(&snapshot);
    let intent = ProgressionIntent::new("scout", 2).with_talent("expert_tracker");

    let result = h.use_cases.level_up(snapshot.id(), &intent).await;

    match result {
        Err(ProgressionUseCaseError::Progression(ProgressionError::Validation(report))) => {
            assert!(!report.valid);
            assert!(report.failed_clauses[0]
                .clause
                .as_str()
                .starts_with("talent[0]:expert_tracker"));
        }
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert_eq!(
        h.store.get(snapshot.id()).await.unwrap().map(|s| s.version()),
        Some(StateVersion::new(7))
    );
}

#[tokio::test]
async fn level_up_unknown_character_is_not_found() {
    let h = harness(&level_one_scout());
    let missing = CharacterId::new();

    let result = h.use_cases.level_up(missing, &level_two_intent()).await;

    assert!(matches!(
        result,
        Err(ProgressionUseCaseError::CharacterNotFound(id)) if id == missing
    ));
}

// =============================================================================
// Preview determinism
// =============================================================================

#[tokio::test]
async fn previews_are_byte_identical_and_do_not_write() {
    let snapshot = level_one_scout();
    let h = harness(&snapshot);

    let first = h
        .use_cases
        .preview(snapshot.id(), &level_two_intent())
        .await
        .unwrap();
    let second = h
        .use_cases
        .preview(snapshot.id(), &level_two_intent())
        .await
        .unwrap();

    assert_eq!(
        serde_json::to_vec(&first.delta).unwrap(),
        serde_json::to_vec(&second.delta).unwrap()
    );
    assert_eq!(first.expected_version, StateVersion::new(7));
    assert_eq!(first.delta.added(Collection::Talents), ["acute_senses".to_string()]);
    assert_eq!(h.store.get(snapshot.id()).await.unwrap(), Some(snapshot));
}

#[tokio::test]
async fn preview_computed_values_include_external_modifiers() {
    let snapshot = level_one_scout();
    let h = harness(&snapshot);
    h.modifiers.push(
        snapshot.id(),
        Modifier::new(
            ModifierSource::Item("blast_helmet".into()),
            Statistic::Reflex,
            2,
            "equipment",
        ),
    );

    let before = h.use_cases.derived_stats(snapshot.id()).await.unwrap();
    let preview = h
        .use_cases
        .preview(snapshot.id(), &level_two_intent())
        .await
        .unwrap();

    // one more level adds one to every defense
    assert_eq!(
        preview.delta.computed_value(&Statistic::Reflex),
        Some(before.reflex + 1)
    );
}

// =============================================================================
// Optimistic concurrency
// =============================================================================

#[tokio::test]
async fn applying_one_preview_twice_commits_once() {
    let snapshot = level_one_scout();
    let h = harness(&snapshot);
    let preview = h
        .use_cases
        .preview(snapshot.id(), &level_two_intent())
        .await
        .unwrap();

    let first = h
        .use_cases
        .apply(snapshot.id(), preview.expected_version, &preview.delta)
        .await;
    let second = h
        .use_cases
        .apply(snapshot.id(), preview.expected_version, &preview.delta)
        .await;

    assert!(first.is_ok());
    let err = second.unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(
        err.progression(),
        Some(ProgressionError::ConcurrentModification { expected, actual })
            if *expected == StateVersion::new(7) && *actual == StateVersion::new(8)
    ));
    let stored = h.store.get(snapshot.id()).await.unwrap().unwrap();
    assert_eq!(stored.version(), StateVersion::new(8));
    assert_eq!(stored.class_history().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_applies_of_one_preview_have_exactly_one_winner() {
    let snapshot = level_one_scout();
    let h = harness(&snapshot);
    let id = snapshot.id();
    let preview = h.use_cases.preview(id, &level_two_intent()).await.unwrap();
    let use_cases = Arc::new(h.use_cases);

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let use_cases = Arc::clone(&use_cases);
            let preview = preview.clone();
            tokio::spawn(async move {
                use_cases
                    .apply(id, preview.expected_version, &preview.delta)
                    .await
            })
        })
        .collect();

    let mut committed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(applied) => {
                committed += 1;
                assert_eq!(applied.new_version, StateVersion::new(8));
            }
            Err(err) => assert!(err.is_retryable(), "unexpected error: {err}"),
        }
    }

    assert_eq!(committed, 1);
    let stored = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(stored.version(), StateVersion::new(8));
    assert_eq!(stored.character_level(), 2);
}

#[tokio::test]
async fn rejected_delta_leaves_record_untouched() {
    let snapshot = level_one_scout();
    let h = harness(&snapshot);
    let delta = Delta::builder(snapshot.id(), snapshot.version())
        .add(Collection::Talents, "acute_senses")
        .add(Collection::Feats, "weapon_proficiency_pistols")
        .build();

    let result = h.use_cases.apply(snapshot.id(), snapshot.version(), &delta).await;

    assert!(matches!(
        result,
        Err(ProgressionUseCaseError::Progression(ProgressionError::InvalidDelta(_)))
    ));
    assert_eq!(h.store.get(snapshot.id()).await.unwrap(), Some(snapshot));
}

#[tokio::test]
async fn expected_version_must_match_delta_base() {
    let snapshot = level_one_scout();
    // No commit expectation: reaching the store would panic.
    let use_cases = mocked(MockCharacterRecordRepo::new(), MockModifierProvider::new());
    let delta = Delta::builder(snapshot.id(), StateVersion::new(6)).build();

    let result = use_cases.apply(snapshot.id(), snapshot.version(), &delta).await;

    assert!(matches!(
        result,
        Err(ProgressionUseCaseError::Progression(ProgressionError::InvalidDelta(_)))
    ));
}

#[tokio::test]
async fn delta_for_another_character_is_refused() {
    let snapshot = level_one_scout();
    let use_cases = mocked(MockCharacterRecordRepo::new(), MockModifierProvider::new());
    let delta = Delta::builder(CharacterId::new(), snapshot.version()).build();

    let result = use_cases.apply(snapshot.id(), snapshot.version(), &delta).await;

    assert!(matches!(
        result,
        Err(ProgressionUseCaseError::Progression(ProgressionError::InvalidDelta(_)))
    ));
}

#[tokio::test]
async fn store_conflict_surfaces_as_concurrent_modification() {
    let snapshot = level_one_scout();
    let mut records = MockCharacterRecordRepo::new();
    records.expect_commit().times(1).returning(|delta| {
        Err(CommitError::Rejected(ProgressionError::ConcurrentModification {
            expected: delta.base_version(),
            actual: delta.base_version().next(),
        }))
    });
    let use_cases = mocked(records, MockModifierProvider::new());
    let delta = Delta::builder(snapshot.id(), snapshot.version()).build();

    let err = use_cases
        .apply(snapshot.id(), snapshot.version(), &delta)
        .await
        .unwrap_err();

    assert!(err.is_retryable());
}

#[tokio::test]
async fn storage_failure_is_a_repo_error() {
    let snapshot = level_one_scout();
    let mut records = MockCharacterRecordRepo::new();
    records
        .expect_commit()
        .returning(|_| Err(CommitError::Repo(RepoError::storage("commit", "disk full"))));
    let use_cases = mocked(records, MockModifierProvider::new());
    let delta = Delta::builder(snapshot.id(), snapshot.version()).build();

    let result = use_cases.apply(snapshot.id(), snapshot.version(), &delta).await;

    assert!(matches!(result, Err(ProgressionUseCaseError::Repo(_))));
}

// =============================================================================
// Determinism check after commit
// =============================================================================

#[tokio::test]
async fn applied_delta_rederives_to_its_computed_values() {
    let snapshot = level_one_scout();
    let use_cases = mocked(serving(&snapshot), no_modifiers());

    let applied = use_cases
        .level_up(snapshot.id(), &level_two_intent())
        .await
        .unwrap();

    assert!(applied.determinism_violations.is_empty());
    assert_eq!(applied.snapshot.version(), StateVersion::new(8));
}

#[tokio::test]
async fn diverging_derivation_is_reported_but_commit_stands() {
    let snapshot = level_one_scout();
    let catalog = catalog();
    let rules = Ruleset::default();
    let delta = ProgressionResolver::new(&catalog, &rules)
        .resolve(&snapshot, &[], &level_two_intent())
        .unwrap();

    // The provider now reports a modifier the resolution never saw.
    let mut modifiers = MockModifierProvider::new();
    modifiers.expect_active_modifiers().returning(|_| {
        Ok(vec![Modifier::new(
            ModifierSource::Effect("stim".into()),
            Statistic::Will,
            1,
            "morale",
        )])
    });
    let use_cases = mocked(serving(&snapshot), modifiers);

    let applied = use_cases
        .apply(snapshot.id(), snapshot.version(), &delta)
        .await
        .unwrap();

    assert_eq!(applied.new_version, StateVersion::new(8));
    assert_eq!(applied.determinism_violations.len(), 1);
    let mismatch = &applied.determinism_violations[0];
    assert_eq!(mismatch.statistic, Statistic::Will);
    assert_eq!(mismatch.derived, mismatch.resolved.map(|v| v + 1));
}

#[tokio::test]
async fn rederive_failure_after_commit_is_reported_on_the_receipt() {
    let snapshot = level_one_scout();
    let h = harness(&snapshot);
    let preview = h
        .use_cases
        .preview(snapshot.id(), &level_two_intent())
        .await
        .unwrap();

    // Equipped between preview and apply, with a bonus type the ruleset
    // does not know.
    h.modifiers.push(
        snapshot.id(),
        Modifier::new(ModifierSource::Effect("charm".into()), Statistic::Reflex, 1, "luck"),
    );

    let applied = h
        .use_cases
        .apply(snapshot.id(), preview.expected_version, &preview.delta)
        .await
        .unwrap();

    assert_eq!(applied.new_version, StateVersion::new(8));
    assert_eq!(applied.derived, None);
    assert!(applied.rederive_error.as_deref().unwrap().contains("luck"));
    assert!(!applied.is_consistent());
    assert_eq!(
        h.store.get(snapshot.id()).await.unwrap().unwrap().version(),
        StateVersion::new(8)
    );
}

#[tokio::test]
async fn modifier_read_failure_after_commit_keeps_the_commit() {
    let snapshot = level_one_scout();
    let catalog = catalog();
    let rules = Ruleset::default();
    let delta = ProgressionResolver::new(&catalog, &rules)
        .resolve(&snapshot, &[], &level_two_intent())
        .unwrap();

    let mut modifiers = MockModifierProvider::new();
    modifiers
        .expect_active_modifiers()
        .returning(|_| Err(RepoError::storage("active_modifiers", "connection reset")));
    let use_cases = mocked(serving(&snapshot), modifiers);

    let applied = use_cases
        .apply(snapshot.id(), snapshot.version(), &delta)
        .await
        .unwrap();

    assert_eq!(applied.new_version, StateVersion::new(8));
    assert!(applied.derived.is_none());
    assert!(applied.rederive_error.is_some());
}

// =============================================================================
// Reads
// =============================================================================

#[tokio::test]
async fn check_reports_unmet_base_attack() {
    let snapshot = level_one_scout();
    let h = harness(&snapshot);

    let report = h
        .use_cases
        .check(snapshot.id(), &R::base_attack(1))
        .await
        .unwrap();

    assert!(!report.valid);
    assert_eq!(
        report.failed_clauses[0].reason,
        "requires base attack bonus +1 (has +0)"
    );

    let report = h
        .use_cases
        .check(snapshot.id(), &R::trained("stealth"))
        .await
        .unwrap();
    assert!(report.valid);
}

#[tokio::test]
async fn base_attack_gate_agrees_with_derived_base_attack() {
    let snapshot = level_one_scout();
    let h = harness(&snapshot);
    h.modifiers.push(
        snapshot.id(),
        Modifier::new(
            ModifierSource::Effect("battle_meditation".into()),
            Statistic::BaseAttack,
            1,
            "untyped",
        ),
    );

    let derived = h.use_cases.derived_stats(snapshot.id()).await.unwrap();
    let report = h
        .use_cases
        .check(snapshot.id(), &R::base_attack(1))
        .await
        .unwrap();

    assert_eq!(derived.base_attack, 1);
    assert!(report.valid, "{report}");
}

#[tokio::test]
async fn check_with_unknown_identifier_is_an_error() {
    let snapshot = level_one_scout();
    let h = harness(&snapshot);

    let result = h.use_cases.check(snapshot.id(), &R::feat("power_atack")).await;

    assert!(matches!(
        result,
        Err(ProgressionUseCaseError::Progression(ProgressionError::UnknownIdentifier { kind: "feat", .. }))
    ));
}

#[tokio::test]
async fn derived_stats_reads_store_and_modifiers() {
    let snapshot = level_one_scout();
    let h = harness(&snapshot);
    let base = h.use_cases.derived_stats(snapshot.id()).await.unwrap();

    h.modifiers.set(
        snapshot.id(),
        vec![Modifier::new(
            ModifierSource::Item("blaster_pistol".into()),
            Statistic::RangedAttack,
            1,
            "equipment",
        )],
    );
    let equipped = h.use_cases.derived_stats(snapshot.id()).await.unwrap();

    assert_eq!(base.base_attack, 0);
    assert_eq!(equipped.ranged_attack, base.ranged_attack + 1);
    assert_eq!(equipped.reflex, base.reflex);
}

#[tokio::test]
async fn talent_options_flag_unmet_prerequisites() {
    let snapshot = level_one_scout();
    let h = harness(&snapshot);

    let options = h
        .use_cases
        .talent_options(snapshot.id(), &"scout".into())
        .await
        .unwrap();

    let valid: Vec<&str> = options
        .iter()
        .filter(|o| o.report.valid)
        .map(|o| o.talent_id.as_str())
        .collect();
    assert_eq!(options.len(), 2);
    assert_eq!(valid, ["acute_senses"]);
}
