use crate::error::DraftError;
use crate::stats::PoolStatistics;
use crate::types::*;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Where a species stands in the draft
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "player")]
pub enum PickStatus {
    Open,
    Banned,
    Picked(usize),
}

/// Lookup key for a typed name: `" Mr. Mime "` becomes `"mr-mime"` and
/// `"Flabébé"` becomes `"flabebe"`.
///
/// Accents are folded by decomposing and dropping the combining marks; any
/// other character outside ASCII word characters and `-` is removed.
pub fn normalize_lookup_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '_')
        .collect::<String>()
        .to_ascii_lowercase();
    cleaned.split_whitespace().collect::<Vec<_>>().join("-")
}

/// Comma separated lookup keys, empty names dropped
pub fn lookup_query(names: &[String]) -> String {
    names
        .iter()
        .map(|n| normalize_lookup_name(n))
        .filter(|n| !n.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// Display form of a hyphenated name: `"mr-mime"` becomes `"Mr Mime"`
pub fn proper_name(name: &str) -> String {
    name.split('-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Pick/ban state of one draft
#[derive(Clone, Debug)]
pub struct DraftBoard {
    species: Vec<Species>,
    settings: DraftSettings,
    banned: Vec<String>,
    picks: Vec<Vec<String>>,
}

impl DraftBoard {
    /// Fails when the pool cannot cover every ban and pick
    pub fn new(species: Vec<Species>, settings: DraftSettings) -> Result<Self, DraftError> {
        let required = settings.required_species();
        if species.len() < required {
            return Err(DraftError::NotEnoughSpecies {
                required,
                available: species.len(),
            });
        }
        let picks = vec![Vec::new(); settings.players.len()];
        Ok(Self {
            species,
            settings,
            banned: Vec::new(),
            picks,
        })
    }

    pub fn settings(&self) -> &DraftSettings {
        &self.settings
    }

    pub fn species(&self) -> &[Species] {
        &self.species
    }

    pub fn banned(&self) -> &[String] {
        &self.banned
    }

    pub fn picks(&self, player: usize) -> Option<&[String]> {
        self.picks.get(player).map(Vec::as_slice)
    }

    pub fn ban_limit(&self) -> usize {
        self.settings.bans * self.settings.players.len()
    }

    /// Open pick slots left for `player`
    pub fn remaining_picks(&self, player: usize) -> Option<usize> {
        self.picks
            .get(player)
            .map(|p| self.settings.picks.saturating_sub(p.len()))
    }

    /// Species owning `name`, matched against the species name or any form name
    pub fn find_species(&self, name: &str) -> Option<&Species> {
        let key = normalize_lookup_name(name);
        self.species
            .iter()
            .find(|s| s.name == key || s.forms.iter().any(|f| f.name == key))
    }

    fn species_name(&self, name: &str) -> Result<String, DraftError> {
        self.find_species(name)
            .map(|s| s.name.clone())
            .ok_or_else(|| DraftError::UnknownSpecies(name.to_string()))
    }

    pub fn ban(&mut self, name: &str) -> Result<(), DraftError> {
        if self.banned.len() >= self.ban_limit() {
            return Err(DraftError::BanLimitReached(self.ban_limit()));
        }
        let species = self.species_name(name)?;

        if !self.banned.contains(&species) {
            self.banned.push(species.clone());
        }
        for picks in self.picks.iter_mut() {
            picks.retain(|p| *p != species);
        }
        debug!("Banned {}", species);
        Ok(())
    }

    pub fn pick(&mut self, name: &str, player: usize) -> Result<(), DraftError> {
        let held = self.picks.get(player).ok_or(DraftError::UnknownPlayer(player))?.len();
        if held >= self.settings.picks {
            return Err(DraftError::PickLimitReached {
                player: self.settings.players[player].name.clone(),
                limit: self.settings.picks,
            });
        }
        let species = self.species_name(name)?;

        self.banned.retain(|b| *b != species);
        for (index, picks) in self.picks.iter_mut().enumerate() {
            if index == player {
                if !picks.contains(&species) {
                    picks.push(species.clone());
                }
            } else {
                picks.retain(|p| *p != species);
            }
        }
        debug!("{} picked {}", self.settings.players[player].name, species);
        Ok(())
    }

    /// Return a species to the open pool
    pub fn unpick(&mut self, name: &str) -> Result<(), DraftError> {
        let species = self.species_name(name)?;
        self.banned.retain(|b| *b != species);
        for picks in self.picks.iter_mut() {
            picks.retain(|p| *p != species);
        }
        Ok(())
    }

    pub fn status(&self, name: &str) -> PickStatus {
        let Some(species) = self.find_species(name) else {
            return PickStatus::Open;
        };
        if self.banned.contains(&species.name) {
            return PickStatus::Banned;
        }
        match self.picks.iter().position(|p| p.contains(&species.name)) {
            Some(player) => PickStatus::Picked(player),
            None => PickStatus::Open,
        }
    }

    /// Highlight color: the ban color, the owning player's color, or none
    pub fn pick_color(&self, name: &str) -> Option<&str> {
        match self.status(name) {
            PickStatus::Banned => Some(self.settings.ban_color.as_str()),
            PickStatus::Picked(player) => self.settings.players.get(player).map(|p| p.color.as_str()),
            PickStatus::Open => None,
        }
    }

    /// Uniform pick among open species, or among all once none are open
    pub fn random_candidate(&self, rng: &mut impl Rng) -> Option<&Species> {
        let open: Vec<&Species> = self
            .species
            .iter()
            .filter(|s| !self.banned.contains(&s.name) && !self.picks.iter().any(|p| p.contains(&s.name)))
            .collect();

        if open.is_empty() {
            return self.species.choose(rng);
        }
        open.choose(rng).copied()
    }

    /// Form of `name` shown at rotation step `index`
    pub fn visible_form(&self, name: &str, index: usize) -> Option<&Entity> {
        self.find_species(name)?
            .visible_form(index, self.settings.form_filter())
    }

    pub fn pool_stats(&self) -> PoolStatistics {
        PoolStatistics::from_species(&self.species, self.settings.form_filter())
    }
}
