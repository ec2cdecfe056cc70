pub mod badges;
pub mod draft;
pub mod error;
pub mod matchmaker;
pub mod percentile;
pub mod rating;
pub mod session;
pub mod stats;
pub mod storage;
pub mod types;

use badges::Badge;
use draft::DraftBoard;
use matchmaker::Side;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use session::FavesSession;
use stats::{compare_by, PoolStatistics};
use storage::{KeyValueStore, MemoryStore};
use types::*;
use wasm_bindgen::prelude::*;

/// Initialize panic hook for better error messages
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn parse<T: serde::de::DeserializeOwned>(json: &str, what: &str) -> Result<T, JsValue> {
    serde_json::from_str(json).map_err(|e| JsValue::from_str(&format!("{} parse error: {}", what, e)))
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_default()
}

fn console_warn(message: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::warn_1(&JsValue::from_str(message));
    #[cfg(not(target_arch = "wasm32"))]
    tracing::warn!("{}", message);
}

/// `localStorage` when the browser offers it, otherwise an in-memory store
fn browser_store() -> Box<dyn KeyValueStore> {
    #[cfg(target_arch = "wasm32")]
    {
        match storage::LocalStorageStore::open() {
            Ok(store) => return Box::new(store),
            Err(e) => console_warn(&format!("Ratings kept in memory only: {}", e)),
        }
    }
    Box::new(MemoryStore::new())
}

/// Seed from the page clock, for callers without a seed of their own
#[wasm_bindgen]
pub fn clock_seed() -> u64 {
    js_sys::Date::now() as u64
}

/// WASM-exposed favourites ranking
#[wasm_bindgen]
pub struct FavesEngine {
    session: FavesSession,
}

#[wasm_bindgen]
impl FavesEngine {
    /// Create a session over `entities_json` with default config
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64, entities_json: &str) -> Result<FavesEngine, JsValue> {
        Self::build(seed, entities_json, EngineConfig::default())
    }

    /// Create with custom config
    pub fn new_with_config(seed: u64, entities_json: &str, config_json: &str) -> Result<FavesEngine, JsValue> {
        let config = EngineConfig::from_json(config_json).map_err(js_error)?;
        Self::build(seed, entities_json, config)
    }

    fn build(seed: u64, entities_json: &str, config: EngineConfig) -> Result<FavesEngine, JsValue> {
        let entities: Vec<Entity> = parse(entities_json, "Entities")?;
        let session = FavesSession::new(entities, config, browser_store(), seed).map_err(js_error)?;
        let mut engine = FavesEngine { session };
        engine.report_storage();
        Ok(engine)
    }

    /// Tell the console the first time ratings stop being saved
    fn report_storage(&mut self) {
        if self.session.take_degraded_notice() {
            console_warn("Saved ratings are unavailable; this session will not be kept");
        }
    }

    /// Both contenders with their ratings as JSON
    pub fn current_pair(&self) -> String {
        to_json(&self.session.current_pair())
    }

    /// Left side wins; returns the rating changes as JSON
    pub fn choose_left(&mut self) -> Result<String, JsValue> {
        self.choose(Side::Left)
    }

    pub fn choose_right(&mut self) -> Result<String, JsValue> {
        self.choose(Side::Right)
    }

    fn choose(&mut self, side: Side) -> Result<String, JsValue> {
        let entry = self.session.choose(side).map_err(js_error)?;
        self.report_storage();
        Ok(serde_json::json!({
            "winner": {
                "number": entry.winner.number,
                "name": entry.winner.name,
                "change": entry.winner.change_label(),
                "hover": entry.winner.hover_text(),
            },
            "loser": {
                "number": entry.loser.number,
                "name": entry.loser.name,
                "change": entry.loser.change_label(),
                "hover": entry.loser.hover_text(),
            },
        })
        .to_string())
    }

    pub fn top(&self) -> String {
        to_json(&self.session.top())
    }

    pub fn bottom(&self) -> String {
        to_json(&self.session.bottom())
    }

    /// Every rated entity with its 1-based rank
    pub fn full_ranking(&self) -> String {
        to_json(&self.session.ranking())
    }

    pub fn stats(&self) -> String {
        to_json(&self.session.summary())
    }

    pub fn winner_stays(&self) -> bool {
        self.session.winner_stays()
    }

    pub fn set_winner_stays(&mut self, enabled: bool) {
        self.session.set_winner_stays(enabled);
        self.report_storage();
    }

    /// Forget all ratings
    pub fn reset(&mut self) {
        self.session.reset();
        self.report_storage();
    }

    /// Get default config as JSON
    pub fn get_default_config() -> String {
        to_json(&EngineConfig::default())
    }
}

/// WASM-exposed pick/ban board
#[wasm_bindgen]
pub struct DraftEngine {
    board: DraftBoard,
    rng: StdRng,
}

#[wasm_bindgen]
impl DraftEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64, species_json: &str, settings_json: &str) -> Result<DraftEngine, JsValue> {
        let species: Vec<Species> = parse(species_json, "Species")?;
        let settings = DraftSettings::from_json(settings_json).map_err(js_error)?;
        let board = DraftBoard::new(species, settings).map_err(js_error)?;
        Ok(DraftEngine {
            board,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn ban(&mut self, name: &str) -> Result<(), JsValue> {
        self.board.ban(name).map_err(js_error)
    }

    pub fn pick(&mut self, name: &str, player: usize) -> Result<(), JsValue> {
        self.board.pick(name, player).map_err(js_error)
    }

    pub fn unpick(&mut self, name: &str) -> Result<(), JsValue> {
        self.board.unpick(name).map_err(js_error)
    }

    pub fn status(&self, name: &str) -> String {
        to_json(&self.board.status(name))
    }

    pub fn pick_color(&self, name: &str) -> Option<String> {
        self.board.pick_color(name).map(str::to_string)
    }

    /// Bans and every player's picks as JSON
    pub fn picks(&self) -> String {
        let picks: Vec<&[String]> = (0..self.board.settings().players.len())
            .filter_map(|player| self.board.picks(player))
            .collect();
        serde_json::json!({
            "banned": self.board.banned(),
            "picks": picks,
        })
        .to_string()
    }

    /// Form of a random open species at rotation step `variant`
    pub fn random(&mut self, variant: usize) -> Option<String> {
        let filter = self.board.settings().form_filter();
        let species = self.board.random_candidate(&mut self.rng)?;
        species.visible_form(variant, filter).map(to_json)
    }

    pub fn visible_form(&self, name: &str, variant: usize) -> Option<String> {
        self.board.visible_form(name, variant).map(to_json)
    }

    pub fn pool_stats(&self) -> String {
        to_json(&self.board.pool_stats())
    }
}

/// Total and bulk values for a stats object
#[wasm_bindgen]
pub fn derive_stats(stats_json: &str) -> Result<String, JsValue> {
    let stats: BaseStats = parse(stats_json, "Stats")?;
    Ok(to_json(&stats.derived()))
}

/// Sorted per-dimension values over the entities the form flags allow
#[wasm_bindgen]
pub fn pool_stats(entities_json: &str, show_mega: bool, show_gmax: bool) -> Result<String, JsValue> {
    let entities: Vec<Entity> = parse(entities_json, "Entities")?;
    let filter = FormFilter::new(show_mega, show_gmax);
    let snapshot = PoolStatistics::from_entities(entities.iter().filter(|e| filter.allows(e)));
    Ok(to_json(&snapshot))
}

#[derive(Serialize)]
struct BadgeView {
    tag: &'static str,
    meaning: &'static str,
    icon: &'static str,
}

impl From<Badge> for BadgeView {
    fn from(badge: Badge) -> Self {
        BadgeView {
            tag: badge.tag(),
            meaning: badge.meaning(),
            icon: badge.icon(),
        }
    }
}

#[wasm_bindgen]
pub fn classify_badges(entity_json: &str) -> Result<String, JsValue> {
    let entity: Entity = parse(entity_json, "Entity")?;
    let badges: Vec<BadgeView> = badges::classify_entity(&entity).into_iter().map(BadgeView::from).collect();
    Ok(to_json(&badges))
}

/// Display tier for a stat value against a sorted pool and/or explicit bounds
#[wasm_bindgen]
pub fn stat_tier(value: f64, pool_json: Option<String>, min: Option<f64>, max: Option<f64>) -> Result<String, JsValue> {
    let pool: Option<Vec<f64>> = match pool_json {
        Some(json) => Some(parse(&json, "Pool")?),
        None => None,
    };
    let tier = percentile::stat_tier(value, pool.as_deref(), min, max);
    Ok(to_json(&tier))
}

/// Radar spokes for one entity, scaled against the given pool
#[wasm_bindgen]
pub fn radar_profile(entity_json: &str, entities_json: &str) -> Result<String, JsValue> {
    let entity: Entity = parse(entity_json, "Entity")?;
    let pool: Vec<Entity> = parse(entities_json, "Entities")?;
    let snapshot = PoolStatistics::from_entities(&pool);
    let axes = if snapshot.is_empty() {
        stats::radar_profile(&entity.stats, None)
    } else {
        stats::radar_profile(&entity.stats, Some(&snapshot))
    };
    Ok(to_json(&axes))
}

/// Entities ordered by `"name"` or a stat dimension key
#[wasm_bindgen]
pub fn sort_entities(entities_json: &str, key: &str) -> Result<String, JsValue> {
    let mut entities: Vec<Entity> = parse(entities_json, "Entities")?;
    let key: SortKey = key.parse().map_err(js_error)?;
    entities.sort_by(compare_by(key));
    Ok(to_json(&entities))
}

/// Comma separated lookup keys for typed names
#[wasm_bindgen]
pub fn lookup_names(names_json: &str) -> Result<String, JsValue> {
    let names: Vec<String> = parse(names_json, "Names")?;
    Ok(draft::lookup_query(&names))
}

#[wasm_bindgen]
pub fn proper_name(name: &str) -> String {
    draft::proper_name(name)
}
