use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Returned for a base stat the upstream record did not carry
pub const MISSING_STAT: i32 = -1;

/// Six base stats of one species variant.
///
/// A value of [`MISSING_STAT`] marks a failed lookup and is kept as-is so the
/// bad record shows up downstream instead of masquerading as a zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseStats {
    pub hp: i32,
    pub attack: i32,
    pub defense: i32,
    pub special_attack: i32,
    pub special_defense: i32,
    pub speed: i32,
}

impl BaseStats {
    pub fn new(
        hp: i32,
        attack: i32,
        defense: i32,
        special_attack: i32,
        special_defense: i32,
        speed: i32,
    ) -> Self {
        Self {
            hp,
            attack,
            defense,
            special_attack,
            special_defense,
            speed,
        }
    }

    /// Build from upstream `(stat name, base value)` pairs such as
    /// `("special-attack", 95)`. Stats absent from `entries` become [`MISSING_STAT`].
    pub fn from_entries(entries: &[(&str, i32)]) -> Self {
        let lookup = |name: &str| {
            entries
                .iter()
                .find(|(stat, _)| *stat == name)
                .map(|&(_, value)| value)
                .unwrap_or(MISSING_STAT)
        };

        Self {
            hp: lookup("hp"),
            attack: lookup("attack"),
            defense: lookup("defense"),
            special_attack: lookup("special-attack"),
            special_defense: lookup("special-defense"),
            speed: lookup("speed"),
        }
    }

    pub fn total(&self) -> i32 {
        self.hp + self.attack + self.defense + self.special_attack + self.special_defense + self.speed
    }

    pub fn has_missing(&self) -> bool {
        [
            self.hp,
            self.attack,
            self.defense,
            self.special_attack,
            self.special_defense,
            self.speed,
        ]
        .contains(&MISSING_STAT)
    }
}

/// One species variant (form) as delivered by the data layer
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identifier, also the key of persisted rating records
    pub number: u32,
    pub name: String,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub abilities: Vec<String>,
    #[serde(default)]
    pub moves: Vec<String>,
    pub stats: BaseStats,
    #[serde(default)]
    pub image: Option<String>,
}

impl Entity {
    pub fn new(number: u32, name: &str, stats: BaseStats) -> Self {
        Self {
            number,
            name: name.to_string(),
            types: Vec::new(),
            abilities: Vec::new(),
            moves: Vec::new(),
            stats,
            image: None,
        }
    }

    pub fn with_moves(mut self, moves: &[&str]) -> Self {
        self.moves = moves.iter().map(|m| m.to_string()).collect();
        self
    }

    pub fn with_abilities(mut self, abilities: &[&str]) -> Self {
        self.abilities = abilities.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_types(mut self, types: &[&str]) -> Self {
        self.types = types.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn with_image(mut self, image: &str) -> Self {
        self.image = Some(image.to_string());
        self
    }
}

/// A species with all of its forms, in upstream order
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub name: String,
    pub forms: Vec<Entity>,
}

impl Species {
    pub fn new(name: &str, forms: Vec<Entity>) -> Self {
        Self {
            name: name.to_string(),
            forms,
        }
    }

    /// Form shown at rotation step `index` among the forms `filter` allows
    pub fn visible_form(&self, index: usize, filter: FormFilter) -> Option<&Entity> {
        let forms: Vec<&Entity> = self.forms.iter().filter(|f| filter.allows(f)).collect();
        if forms.is_empty() {
            return None;
        }
        Some(forms[index % forms.len()])
    }
}

/// Decides which variant forms take part in pool aggregation.
/// Totem forms never do.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormFilter {
    pub show_mega: bool,
    pub show_gmax: bool,
}

impl FormFilter {
    pub fn new(show_mega: bool, show_gmax: bool) -> Self {
        Self { show_mega, show_gmax }
    }

    pub fn allows(&self, entity: &Entity) -> bool {
        let name = entity.name.as_str();
        let is_totem = name.ends_with("-totem") || name.contains("-totem-");
        let hidden_mega = !self.show_mega && name.ends_with("-mega");
        let hidden_gmax = !self.show_gmax && name.ends_with("-gmax");
        !(is_totem || hidden_mega || hidden_gmax)
    }
}

/// Stat dimensions tracked across a pool
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatDimension {
    Hp,
    Attack,
    Defense,
    SpecialAttack,
    SpecialDefense,
    Speed,
    PhysicalBulk,
    SpecialBulk,
    Total,
}

impl StatDimension {
    pub const ALL: [StatDimension; 9] = [
        StatDimension::Hp,
        StatDimension::Attack,
        StatDimension::Defense,
        StatDimension::SpecialAttack,
        StatDimension::SpecialDefense,
        StatDimension::Speed,
        StatDimension::PhysicalBulk,
        StatDimension::SpecialBulk,
        StatDimension::Total,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            StatDimension::Hp => "hp",
            StatDimension::Attack => "attack",
            StatDimension::Defense => "defense",
            StatDimension::SpecialAttack => "specialAttack",
            StatDimension::SpecialDefense => "specialDefense",
            StatDimension::Speed => "speed",
            StatDimension::PhysicalBulk => "physicalBulk",
            StatDimension::SpecialBulk => "specialBulk",
            StatDimension::Total => "total",
        }
    }
}

impl fmt::Display for StatDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for StatDimension {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StatDimension::ALL
            .into_iter()
            .find(|d| d.key() == s)
            .ok_or_else(|| ConfigError::UnknownDimension(s.to_string()))
    }
}

/// Ordering key accepted by the entity comparator
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortKey {
    Name,
    Stat(StatDimension),
}

impl FromStr for SortKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "name" {
            return Ok(SortKey::Name);
        }
        s.parse().map(SortKey::Stat)
    }
}

/// Persisted rating of one entity.
///
/// Field names follow the stored JSON shape (`elo`, `matches`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub number: u32,
    pub name: String,
    #[serde(default)]
    pub image: Option<String>,
    pub elo: f64,
    pub matches: u32,
}

impl RatingRecord {
    pub fn fresh(entity: &Entity, starting_elo: f64) -> Self {
        Self {
            number: entity.number,
            name: entity.name.clone(),
            image: entity.image.clone(),
            elo: starting_elo,
            matches: 0,
        }
    }
}

/// Before/after rating of one side of the latest comparison
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RatingChange {
    pub number: u32,
    pub name: String,
    pub before: f64,
    pub after: f64,
}

impl RatingChange {
    pub fn change(&self) -> f64 {
        self.after - self.before
    }

    /// Signed, rounded delta label: `+12`, `-7` or `±0`
    pub fn change_label(&self) -> String {
        let rounded = self.change().round() as i64;
        if rounded > 0 {
            format!("+{}", rounded)
        } else if rounded < 0 {
            rounded.to_string()
        } else {
            "±0".to_string()
        }
    }

    pub fn hover_text(&self) -> String {
        format!("{} ⇒ {}", self.before.round() as i64, self.after.round() as i64)
    }
}

/// Outcome of the most recent comparison. Never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchHistoryEntry {
    pub winner: RatingChange,
    pub loser: RatingChange,
}

/// Rating and pairing configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rating given to an entity on its first comparison
    pub starting_elo: f64,
    /// Rating an opponent is credited with above/below its own on a win/loss
    pub performance_value: f64,
    /// Smallest relative rating move per comparison
    pub min_change_pct: f64,
    /// A replacement opponent must be rated above `loser_elo * replacement_threshold`
    pub replacement_threshold: f64,
    /// Win streak during which a caught-up winner still keeps its seat
    pub winner_stays_grace: u32,
    /// Length of the top and bottom lists
    pub top_list_size: usize,
    pub storage_key: String,
    pub winner_stays_key: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            starting_elo: 1500.0,
            performance_value: 400.0,
            min_change_pct: 0.004,
            replacement_threshold: 0.75,
            winner_stays_grace: 0,
            top_list_size: 10,
            storage_key: "comparison".to_string(),
            winner_stays_key: "winner_stays".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.starting_elo.is_finite() {
            return Err(ConfigError::Invalid("starting_elo must be finite".to_string()));
        }
        if !self.performance_value.is_finite() || self.performance_value < 0.0 {
            return Err(ConfigError::Invalid(
                "performance_value must be a non-negative number".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.min_change_pct) {
            return Err(ConfigError::Invalid("min_change_pct must be in [0, 1)".to_string()));
        }
        if !self.replacement_threshold.is_finite() || self.replacement_threshold < 0.0 {
            return Err(ConfigError::Invalid(
                "replacement_threshold must be a non-negative number".to_string(),
            ));
        }
        if self.storage_key.is_empty() || self.storage_key == self.winner_stays_key {
            return Err(ConfigError::Invalid(
                "storage keys must be non-empty and distinct".to_string(),
            ));
        }
        Ok(())
    }
}

/// A drafting party
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerData {
    pub name: String,
    pub color: String,
}

/// Pick/ban draft settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DraftSettings {
    pub names: Vec<String>,
    pub bans: usize,
    pub picks: usize,
    pub ban_color: String,
    pub players: Vec<PlayerData>,
    pub show_mega: bool,
    pub show_gmax: bool,
}

impl Default for DraftSettings {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            bans: 3,
            picks: 9,
            ban_color: "#ff0000".to_string(),
            players: vec![
                PlayerData {
                    name: "Player 1".to_string(),
                    color: "#00ff00".to_string(),
                },
                PlayerData {
                    name: "Player 2".to_string(),
                    color: "#0000ff".to_string(),
                },
            ],
            show_mega: false,
            show_gmax: false,
        }
    }
}

impl DraftSettings {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let settings: DraftSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.players.is_empty() {
            return Err(ConfigError::Invalid("a draft needs at least one player".to_string()));
        }
        Ok(())
    }

    pub fn form_filter(&self) -> FormFilter {
        FormFilter::new(self.show_mega, self.show_gmax)
    }

    /// Species needed before the draft can start
    pub fn required_species(&self) -> usize {
        (self.bans + self.picks) * self.players.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str) -> Entity {
        Entity::new(1, name, BaseStats::new(50, 50, 50, 50, 50, 50))
    }

    #[test]
    fn test_missing_stats_become_sentinel() {
        let stats = BaseStats::from_entries(&[("hp", 80), ("attack", 82), ("speed", 80)]);
        assert_eq!(stats.hp, 80);
        assert_eq!(stats.defense, MISSING_STAT);
        assert_eq!(stats.special_defense, MISSING_STAT);
        assert!(stats.has_missing());
        // sentinel is summed as-is, not coerced to zero
        assert_eq!(stats.total(), 80 + 82 + 80 - 3);
    }

    #[test]
    fn test_form_filter() {
        let filter = FormFilter::default();
        assert!(filter.allows(&form("charizard")));
        assert!(!filter.allows(&form("charizard-mega")));
        assert!(!filter.allows(&form("charizard-gmax")));
        assert!(!filter.allows(&form("raticate-totem-alola")));
        assert!(!filter.allows(&form("gumshoos-totem")));

        let all = FormFilter::new(true, true);
        assert!(all.allows(&form("charizard-mega")));
        assert!(all.allows(&form("charizard-gmax")));
        assert!(!all.allows(&form("gumshoos-totem")));
    }

    #[test]
    fn test_visible_form_rotates_over_allowed_forms() {
        let species = Species::new(
            "Charizard",
            vec![form("charizard"), form("charizard-mega"), form("charizard-gmax")],
        );
        let filter = FormFilter::new(false, true);
        assert_eq!(species.visible_form(0, filter).unwrap().name, "charizard");
        assert_eq!(species.visible_form(1, filter).unwrap().name, "charizard-gmax");
        assert_eq!(species.visible_form(2, filter).unwrap().name, "charizard");

        let totem_only = Species::new("Gumshoos", vec![form("gumshoos-totem")]);
        assert!(totem_only.visible_form(0, filter).is_none());
    }

    #[test]
    fn test_dimension_keys_round_trip() {
        for dimension in StatDimension::ALL {
            assert_eq!(dimension.key().parse::<StatDimension>().unwrap(), dimension);
        }
        assert_eq!("name".parse::<SortKey>().unwrap(), SortKey::Name);
        assert!("weight".parse::<SortKey>().is_err());
    }

    #[test]
    fn test_change_labels() {
        let up = RatingChange { number: 1, name: "a".into(), before: 1500.0, after: 1900.0 };
        let down = RatingChange { number: 2, name: "b".into(), before: 1500.0, after: 1100.4 };
        let flat = RatingChange { number: 3, name: "c".into(), before: 1500.0, after: 1500.2 };
        assert_eq!(up.change_label(), "+400");
        assert_eq!(down.change_label(), "-400");
        assert_eq!(flat.change_label(), "±0");
        assert_eq!(up.hover_text(), "1500 ⇒ 1900");
    }

    #[test]
    fn test_config_from_json_uses_defaults() {
        let config = EngineConfig::from_json(r#"{"winner_stays_grace": 3}"#).unwrap();
        assert_eq!(config.winner_stays_grace, 3);
        assert_eq!(config.starting_elo, 1500.0);

        assert!(EngineConfig::from_json(r#"{"min_change_pct": 1.5}"#).is_err());
        assert!(EngineConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_draft_settings_requirements() {
        let settings = DraftSettings::default();
        assert_eq!(settings.required_species(), 24);
        assert!(DraftSettings::from_json(r#"{"players": []}"#).is_err());
    }
}
