//! BDD tests for the journal workflow
//!
//! These tests follow one trader through the three screens:
//! - Level manager: add, list, remove levels
//! - Study: merged view, nearest levels, mood, "save and advance"
//! - Execution view: stop/targets from the frozen snapshot

use chrono::{TimeZone, Utc};
use xrpaper_core::auth::{hash_password, AuthProvider, LocalAuth, LocalUser};
use xrpaper_core::domain::{LevelType, RawIndicatorInputs, SnapshotId, Timeframe, UserId};
use xrpaper_core::execution::Mode;
use xrpaper_core::journal::{Journal, JournalError, LevelInput, StudyRequest};
use xrpaper_core::levels::LevelKind;
use xrpaper_core::mood::{create_mood_policy, AdditiveScore, Mood, MoodPolicyConfig};
use xrpaper_core::report::render_execution;
use xrpaper_core::store::{LevelFilter, LevelStore, MemoryStore, StoreError};

fn trader_auth() -> LocalAuth {
    let auth = LocalAuth::new(vec![
        LocalUser {
            email: "trader@example.com".into(),
            password_blake3: hash_password("hunter2"),
            user_id: UserId::new("u1"),
        },
        LocalUser {
            email: "other@example.com".into(),
            password_blake3: hash_password("pw"),
            user_id: UserId::new("u2"),
        },
    ]);
    auth.sign_in_with_password("trader@example.com", "hunter2")
        .expect("sign-in should succeed");
    auth
}

fn level(price: &str, level_type: LevelType) -> LevelInput {
    LevelInput {
        symbol: "BTCUSDT".into(),
        timeframe: Timeframe::M5,
        level_type,
        price: price.into(),
        observed_at: None,
    }
}

fn reference_study() -> StudyRequest {
    StudyRequest {
        symbol: "btcusdt".into(),
        timeframe: Timeframe::M5,
        from: None,
        to: None,
        inputs: RawIndicatorInputs {
            price: Some("112500".into()),
            atr: Some("89,74".into()),
            rsi_k: Some("43.41".into()),
            rsi_d: Some("47,94".into()),
            ema20: Some("112.043,00".into()),
            ema200: Some("112335".into()),
            vwap: None,
            vol_avg: Some("8684".into()),
        },
    }
}

#[test]
fn bdd_scenario_study_then_execute_breakout() {
    // GIVEN a signed-in trader with one support and one resistance
    let store = MemoryStore::new();
    let auth = trader_auth();
    let journal = Journal::new(&store, &store, &auth, Box::new(AdditiveScore::default()));
    journal.add_level(level("112000", LevelType::Support)).unwrap();
    journal.add_level(level("113.000,00", LevelType::Resistance)).unwrap();

    // WHEN the trader studies BTCUSDT at 112500
    let view = journal.study(&reference_study()).unwrap();

    // THEN levels and overlays are merged, highest price first
    assert_eq!(view.merged.len(), 5);
    let prices: Vec<f64> = view.merged.iter().map(|m| m.price()).collect();
    assert_eq!(prices, vec![113000.0, 112500.0, 112335.0, 112043.0, 112000.0]);
    assert_eq!(view.merged[0].kind(), LevelKind::Hl);
    assert_eq!(view.merged[1].kind(), LevelKind::Overlay);

    // AND the nearest levels bound the price
    assert_eq!(view.nearest.support1, Some(112000.0));
    assert_eq!(view.nearest.resistance1, Some(113000.0));

    // AND the mood scores price>ema20, price>ema200, atr>0 = 3
    assert_eq!(view.mood.mood, Mood::Favorable);

    // WHEN the study is saved and opened in the execution view
    let id = journal.save_study(&view).unwrap();
    let exec = journal
        .execution_view(&id, Mode::Breakout)
        .unwrap()
        .expect("snapshot should exist");

    // THEN the long plan uses the frozen levels and RR is 1
    assert_eq!(exec.long.plan.stop, Some(112000.0));
    assert_eq!(exec.long.plan.target1, Some(113000.0));
    assert_eq!(exec.long.plan.risk_reward1, Some(1.0));
    assert_eq!(exec.short.plan.stop, Some(113000.0));
    assert_eq!(exec.snapshot.signal, Some(Mood::Favorable));
    assert_eq!(exec.snapshot.hl_rows.len(), 2);
}

#[test]
fn bdd_scenario_snapshot_is_frozen_against_level_edits() {
    // GIVEN a saved study with a support at 112000
    let store = MemoryStore::new();
    let auth = trader_auth();
    let journal = Journal::new(&store, &store, &auth, Box::new(AdditiveScore::default()));
    let support = journal.add_level(level("112000", LevelType::Support)).unwrap();
    let view = journal.study(&reference_study()).unwrap();
    let id = journal.save_study(&view).unwrap();

    // WHEN the level is deleted and a closer one added afterwards
    journal.remove_level(&support.id).unwrap();
    journal.add_level(level("112400", LevelType::Support)).unwrap();

    // THEN the execution view still plans from the level seen during the study
    let exec = journal.execution_view(&id, Mode::Pullback).unwrap().unwrap();
    assert_eq!(exec.long.plan.stop, Some(112000.0));
    assert!(exec.snapshot.hl_rows[0].at.is_some());
}

#[test]
fn bdd_scenario_modes_share_numbers_but_not_guidance() {
    // GIVEN a saved study
    let store = MemoryStore::new();
    let auth = trader_auth();
    let journal = Journal::new(&store, &store, &auth, Box::new(AdditiveScore::default()));
    journal.add_level(level("112000", LevelType::Support)).unwrap();
    let id = journal
        .save_study(&journal.study(&reference_study()).unwrap())
        .unwrap();

    // WHEN it is viewed in both modes
    let breakout = journal.execution_view(&id, Mode::Breakout).unwrap().unwrap();
    let pullback = journal.execution_view(&id, Mode::Pullback).unwrap().unwrap();

    // THEN stops and targets agree and only the checklist differs
    assert_eq!(breakout.long.plan.stop, pullback.long.plan.stop);
    assert_eq!(breakout.long.plan.target1, pullback.long.plan.target1);
    assert_ne!(breakout.long.guidance.title, pullback.long.guidance.title);

    // AND the markdown report reflects the chosen mode
    assert!(render_execution(&pullback).contains("Gatilhos simples (Pullback)"));
}

#[test]
fn bdd_scenario_latest_execution_view_is_per_user() {
    // GIVEN two saved studies by the trader
    let store = MemoryStore::new();
    let auth = trader_auth();
    let journal = Journal::new(&store, &store, &auth, Box::new(AdditiveScore::default()));
    journal
        .save_study(&journal.study(&reference_study()).unwrap())
        .unwrap();
    let mut second = reference_study();
    second.symbol = "ETHUSDT".into();
    let second_id = journal
        .save_study(&journal.study(&second).unwrap())
        .unwrap();

    // WHEN the trader opens the latest snapshot
    let latest = journal.latest_execution_view(Mode::Breakout).unwrap().unwrap();

    // THEN it is the most recent one
    assert_eq!(latest.snapshot.id, second_id);
    assert_eq!(latest.snapshot.symbol.as_deref(), Some("ETHUSDT"));

    // AND another user sees nothing
    auth.sign_out().unwrap();
    auth.sign_in_with_password("other@example.com", "pw").unwrap();
    assert!(journal.latest_execution_view(Mode::Breakout).unwrap().is_none());
}

#[test]
fn bdd_scenario_levels_are_private_to_their_owner() {
    // GIVEN the trader's level and saved study
    let store = MemoryStore::new();
    let auth = trader_auth();
    let journal = Journal::new(&store, &store, &auth, Box::new(AdditiveScore::default()));
    let owned = journal.add_level(level("112000", LevelType::Support)).unwrap();
    let snapshot = journal
        .save_study(&journal.study(&reference_study()).unwrap())
        .unwrap();

    // WHEN another user signs in on the same store
    auth.sign_out().unwrap();
    auth.sign_in_with_password("other@example.com", "pw").unwrap();

    // THEN the list is empty
    assert!(journal.list_levels("BTCUSDT", None).unwrap().is_empty());

    // AND the trader's snapshot cannot be opened by id
    assert!(journal
        .execution_view(&snapshot, Mode::Breakout)
        .unwrap()
        .is_none());

    // AND neither row can be deleted
    assert!(matches!(
        journal.remove_level(&owned.id),
        Err(JournalError::Store(StoreError::LevelNotFound(_)))
    ));
    assert!(matches!(
        journal.remove_snapshot(&snapshot),
        Err(JournalError::Store(StoreError::SnapshotNotFound(_)))
    ));
    assert_eq!(store.level_count(), 1);
    assert_eq!(store.snapshot_count(), 1);

    // AND the owner still can
    auth.sign_out().unwrap();
    auth.sign_in_with_password("trader@example.com", "hunter2").unwrap();
    assert!(journal.execution_view(&snapshot, Mode::Breakout).unwrap().is_some());
    journal.remove_level(&owned.id).unwrap();
    journal.remove_snapshot(&snapshot).unwrap();
    assert_eq!(store.level_count(), 0);
    assert_eq!(store.snapshot_count(), 0);
}

#[test]
fn bdd_scenario_period_filter_excludes_untimed_levels() {
    // GIVEN one timed and one untimed level
    let store = MemoryStore::new();
    let auth = trader_auth();
    let journal = Journal::new(&store, &store, &auth, Box::new(AdditiveScore::default()));
    let at = Utc.with_ymd_and_hms(2025, 9, 1, 12, 0, 0).unwrap();
    let mut timed = level("112000", LevelType::Support);
    timed.observed_at = Some(at);
    journal.add_level(timed).unwrap();
    journal.add_level(level("111000", LevelType::Support)).unwrap();

    // WHEN the study covers a period
    let mut request = reference_study();
    request.from = Some(Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap());
    request.to = Some(Utc.with_ymd_and_hms(2025, 9, 2, 0, 0, 0).unwrap());
    let view = journal.study(&request).unwrap();

    // THEN only the timed level is in scope
    assert_eq!(view.levels.len(), 1);
    assert_eq!(view.levels[0].price, 112000.0);
}

#[test]
fn bdd_scenario_atr_band_policy_from_config() {
    // GIVEN the ATR-band policy selected by configuration
    let store = MemoryStore::new();
    let auth = trader_auth();
    let policy = create_mood_policy(&MoodPolicyConfig::atr_band_defaults()).unwrap();
    let journal = Journal::new(&store, &store, &auth, policy);

    // WHEN the reference study runs (ATR% is about 0.08, RSI K below D)
    let view = journal.study(&reference_study()).unwrap();

    // THEN the same inputs that score Favorable additively are Unfavorable here
    assert_eq!(view.mood.policy, "atr_band");
    assert_eq!(view.mood.mood, Mood::Unfavorable);
}

/// A level store that is always down.
struct BrokenStore;

impl LevelStore for BrokenStore {
    fn query_levels(&self, _: &LevelFilter) -> Result<Vec<xrpaper_core::domain::PriceLevel>, StoreError> {
        Err(StoreError::NetworkUnreachable("offline".into()))
    }

    fn insert_level(
        &self,
        _: xrpaper_core::domain::NewLevel,
    ) -> Result<xrpaper_core::domain::PriceLevel, StoreError> {
        Err(StoreError::NetworkUnreachable("offline".into()))
    }

    fn delete_level(
        &self,
        _: &xrpaper_core::domain::LevelId,
        _: &UserId,
    ) -> Result<(), StoreError> {
        Err(StoreError::NetworkUnreachable("offline".into()))
    }
}

#[test]
fn bdd_scenario_study_survives_level_store_outage() {
    // GIVEN a level store that cannot be reached
    let levels = BrokenStore;
    let snapshots = MemoryStore::new();
    let auth = trader_auth();
    let journal = Journal::new(&levels, &snapshots, &auth, Box::new(AdditiveScore::default()));

    // WHEN the trader studies
    let view = journal.study(&reference_study()).unwrap();

    // THEN the study proceeds with overlays only
    assert!(view.levels.is_empty());
    assert_eq!(view.merged.len(), 3);
    assert_eq!(view.nearest.support1, None);

    // AND adding a level surfaces the store error
    assert!(matches!(
        journal.add_level(level("1", LevelType::Support)),
        Err(JournalError::Store(_))
    ));
}

#[test]
fn bdd_scenario_signed_out_trader_is_refused() {
    // GIVEN a trader who signed out
    let store = MemoryStore::new();
    let auth = trader_auth();
    auth.sign_out().unwrap();
    let journal = Journal::new(&store, &store, &auth, Box::new(AdditiveScore::default()));

    // WHEN any screen is used THEN the journal refuses
    assert!(matches!(journal.study(&reference_study()), Err(JournalError::NotSignedIn)));
    assert!(matches!(
        journal.execution_view(&SnapshotId::new("1"), Mode::Breakout),
        Err(JournalError::NotSignedIn)
    ));
    assert!(matches!(
        journal.remove_snapshot(&SnapshotId::new("1")),
        Err(JournalError::NotSignedIn)
    ));
}
