//! Journal: the service behind the level manager, the study screen and the
//! execution view.
//!
//! Every operation needs a signed-in user. Collaborators are borrowed, so the
//! caller decides where they live and how long.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::auth::{AuthProvider, Session};
use crate::domain::{
    IndicatorInputs, IndicatorSnapshot, LevelId, LevelType, NewLevel, NewSnapshot, PriceLevel,
    RawIndicatorInputs, SnapshotId, Timeframe,
};
use crate::execution::{guidance, plan_execution, Direction, ExecutionContext, ExecutionPlan, Guidance, Mode};
use crate::levels::{
    build_overlays, merge_and_sort, select_nearest, select_nearest_merged, MergedLevel,
    NearestLevels, OverlayLevel,
};
use crate::mood::{MoodEvaluation, MoodPolicy};
use crate::numeric::normalize_number;
use crate::store::{LevelFilter, LevelStore, SnapshotStore, StoreError};

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("not signed in")]
    NotSignedIn,

    #[error("level price is required")]
    MissingPrice,

    #[error("invalid level price '{0}': must be a positive number")]
    InvalidPrice(String),

    #[error("symbol is required")]
    MissingSymbol,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A level as typed into the level manager.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelInput {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub level_type: LevelType,
    /// Raw price, either decimal convention.
    pub price: String,
    pub observed_at: Option<DateTime<Utc>>,
}

/// Parameters of one study session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudyRequest {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub inputs: RawIndicatorInputs,
}

/// Everything the study screen shows. Derived, not persisted until saved.
#[derive(Debug, Clone, Serialize)]
pub struct StudyView {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub inputs: IndicatorInputs,
    pub atr_pct: Option<f64>,
    pub levels: Vec<PriceLevel>,
    pub overlays: Vec<OverlayLevel>,
    pub merged: Vec<MergedLevel>,
    pub nearest: NearestLevels,
    pub mood: MoodEvaluation,
}

/// One direction of the execution view.
#[derive(Debug, Clone, Serialize)]
pub struct DirectionView {
    pub plan: ExecutionPlan,
    pub guidance: Guidance,
}

/// A saved study read back with stop/targets for both directions.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionView {
    pub snapshot: IndicatorSnapshot,
    pub mode: Mode,
    pub nearest: NearestLevels,
    pub long: DirectionView,
    pub short: DirectionView,
}

impl ExecutionView {
    pub fn build(snapshot: IndicatorSnapshot, mode: Mode) -> Self {
        let px = snapshot.price_now.unwrap_or(f64::NAN);
        let nearest = select_nearest(&snapshot.hl_rows, px);
        let ctx = ExecutionContext::new(snapshot.price_now, snapshot.ema20, snapshot.ema200, &nearest);
        let direction = |d: Direction| DirectionView {
            plan: plan_execution(&ctx, d, mode),
            guidance: guidance(d, mode),
        };
        Self {
            long: direction(Direction::Long),
            short: direction(Direction::Short),
            snapshot,
            mode,
            nearest,
        }
    }
}

pub struct Journal<'a> {
    levels: &'a dyn LevelStore,
    snapshots: &'a dyn SnapshotStore,
    auth: &'a dyn AuthProvider,
    mood: Box<dyn MoodPolicy>,
}

impl<'a> Journal<'a> {
    pub fn new(
        levels: &'a dyn LevelStore,
        snapshots: &'a dyn SnapshotStore,
        auth: &'a dyn AuthProvider,
        mood: Box<dyn MoodPolicy>,
    ) -> Self {
        Self {
            levels,
            snapshots,
            auth,
            mood,
        }
    }

    pub fn mood_policy(&self) -> &dyn MoodPolicy {
        self.mood.as_ref()
    }

    fn session(&self) -> Result<Session, JournalError> {
        self.auth.current_session().ok_or(JournalError::NotSignedIn)
    }

    // ─── Level manager ───────────────────────────────────────────────

    pub fn add_level(&self, input: LevelInput) -> Result<PriceLevel, JournalError> {
        let session = self.session()?;
        let symbol = input.symbol.trim();
        if symbol.is_empty() {
            return Err(JournalError::MissingSymbol);
        }
        if input.price.trim().is_empty() {
            return Err(JournalError::MissingPrice);
        }
        let price = normalize_number(&input.price)
            .filter(|p| *p > 0.0)
            .ok_or_else(|| JournalError::InvalidPrice(input.price.clone()))?;

        let mut level = NewLevel::new(symbol, input.timeframe, input.level_type, price)
            .with_user(session.user_id);
        level.observed_at = input.observed_at;
        Ok(self.levels.insert_level(level)?)
    }

    /// The user's levels for a symbol, highest price first.
    pub fn list_levels(
        &self,
        symbol: &str,
        timeframe: Option<Timeframe>,
    ) -> Result<Vec<PriceLevel>, JournalError> {
        let session = self.session()?;
        let filter = LevelFilter::for_symbol(symbol)
            .user(session.user_id)
            .timeframe(timeframe);
        Ok(self.levels.query_levels(&filter)?)
    }

    /// Only the owner can remove a level; anyone else gets `LevelNotFound`.
    pub fn remove_level(&self, id: &LevelId) -> Result<(), JournalError> {
        let session = self.session()?;
        Ok(self.levels.delete_level(id, &session.user_id)?)
    }

    // ─── Study ───────────────────────────────────────────────────────

    /// Compute the study view. A failing level store degrades to no levels.
    pub fn study(&self, request: &StudyRequest) -> Result<StudyView, JournalError> {
        let session = self.session()?;
        let symbol = request.symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(JournalError::MissingSymbol);
        }
        let inputs = IndicatorInputs::from_raw(&request.inputs);

        let filter = LevelFilter::for_symbol(&symbol)
            .user(session.user_id)
            .timeframe(Some(request.timeframe))
            .between(request.from, request.to);
        let levels = self.levels.query_levels(&filter).unwrap_or_else(|e| {
            warn!(%symbol, error = %e, "level lookup failed; studying without levels");
            Vec::new()
        });

        let overlays = build_overlays(&inputs.overlay_inputs());
        let merged = merge_and_sort(&levels, &overlays);
        let nearest = select_nearest_merged(&merged, inputs.price.unwrap_or(f64::NAN));
        let mood = self.mood.classify(&inputs.mood_inputs());
        debug!(
            %symbol,
            levels = levels.len(),
            policy = %mood.policy,
            mood = %mood.mood,
            "study computed"
        );

        Ok(StudyView {
            symbol,
            timeframe: request.timeframe,
            from: request.from,
            to: request.to,
            atr_pct: inputs.atr_pct(),
            inputs,
            levels,
            overlays,
            merged,
            nearest,
            mood,
        })
    }

    /// "Save and advance": freeze the study into a snapshot.
    pub fn save_study(&self, view: &StudyView) -> Result<SnapshotId, JournalError> {
        let session = self.session()?;
        let snapshot = NewSnapshot::capture(
            Some(session.user_id),
            &view.symbol,
            view.timeframe,
            view.from,
            view.to,
            &view.inputs,
            view.mood.mood,
            &view.levels,
            Utc::now(),
        );
        let id = self.snapshots.insert_snapshot(snapshot)?;
        info!(%id, symbol = %view.symbol, levels = view.levels.len(), "study saved");
        Ok(id)
    }

    // ─── Execution view ──────────────────────────────────────────────

    /// `None` when the snapshot is missing or belongs to another user.
    pub fn execution_view(
        &self,
        id: &SnapshotId,
        mode: Mode,
    ) -> Result<Option<ExecutionView>, JournalError> {
        let session = self.session()?;
        let snapshot = self
            .snapshots
            .get_snapshot(id)?
            .filter(|s| s.user_id.as_ref() == Some(&session.user_id));
        Ok(snapshot.map(|s| ExecutionView::build(s, mode)))
    }

    /// Execution view of the user's most recent snapshot.
    pub fn latest_execution_view(&self, mode: Mode) -> Result<Option<ExecutionView>, JournalError> {
        let session = self.session()?;
        let snapshot = self.snapshots.latest_snapshot(&session.user_id)?;
        Ok(snapshot.map(|s| ExecutionView::build(s, mode)))
    }

    pub fn remove_snapshot(&self, id: &SnapshotId) -> Result<(), JournalError> {
        let session = self.session()?;
        Ok(self.snapshots.delete_snapshot(id, &session.user_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{hash_password, LocalAuth, LocalUser};
    use crate::domain::{SnapshotLevel, UserId};
    use crate::mood::{AdditiveScore, Mood};
    use crate::store::MemoryStore;

    fn auth() -> LocalAuth {
        LocalAuth::new(vec![LocalUser {
            email: "t@x.io".into(),
            password_blake3: hash_password("pw"),
            user_id: UserId::new("u1"),
        }])
    }

    fn input(price: &str) -> LevelInput {
        LevelInput {
            symbol: "btcusdt".into(),
            timeframe: Timeframe::M5,
            level_type: LevelType::Support,
            price: price.into(),
            observed_at: None,
        }
    }

    #[test]
    fn everything_requires_a_session() {
        let store = MemoryStore::new();
        let auth = auth();
        let journal = Journal::new(&store, &store, &auth, Box::new(AdditiveScore::default()));

        assert!(matches!(journal.add_level(input("1")), Err(JournalError::NotSignedIn)));
        assert!(matches!(journal.list_levels("X", None), Err(JournalError::NotSignedIn)));
        assert!(matches!(
            journal.latest_execution_view(Mode::Breakout),
            Err(JournalError::NotSignedIn)
        ));
    }

    #[test]
    fn add_level_validates_price() {
        let store = MemoryStore::new();
        let auth = auth();
        auth.sign_in_with_password("t@x.io", "pw").unwrap();
        let journal = Journal::new(&store, &store, &auth, Box::new(AdditiveScore::default()));

        assert!(matches!(journal.add_level(input(" ")), Err(JournalError::MissingPrice)));
        assert!(matches!(journal.add_level(input("abc")), Err(JournalError::InvalidPrice(_))));
        assert!(matches!(journal.add_level(input("-5")), Err(JournalError::InvalidPrice(_))));
        assert!(matches!(journal.add_level(input("0")), Err(JournalError::InvalidPrice(_))));

        let stored = journal.add_level(input("112.000,50")).unwrap();
        assert_eq!(stored.price, 112000.5);
        assert_eq!(stored.symbol, "BTCUSDT");
        assert_eq!(stored.user_id, Some(UserId::new("u1")));
        assert_eq!(store.level_count(), 1);
    }

    #[test]
    fn execution_view_without_price_has_no_levels_or_plan() {
        let snapshot = IndicatorSnapshot {
            id: SnapshotId::new("1"),
            user_id: None,
            symbol: Some("X".into()),
            timeframe: None,
            date_from: None,
            date_to: None,
            price_now: None,
            atr_abs: None,
            atr_pct: None,
            rsi_k: None,
            rsi_d: None,
            ema20: None,
            ema200: None,
            vwap: None,
            vol_avg: None,
            signal: Some(Mood::Neutral),
            hl_rows: vec![SnapshotLevel {
                price: 10.0,
                timeframe: None,
                level_type: LevelType::Support,
                at: None,
            }],
            created_at: None,
        };
        let view = ExecutionView::build(snapshot, Mode::Pullback);
        assert_eq!(view.nearest, NearestLevels::default());
        assert_eq!(view.long.plan.stop, None);
        assert_eq!(view.short.plan.target1, None);
        assert_eq!(view.long.guidance.title, "Long (Compra por pullback)");
    }
}
