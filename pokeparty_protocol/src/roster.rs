// Roster Selection: a client's final pick of creatures from one type.
//
// Sent exactly once per connection, client → server, as a framed JSON
// object. The field names are capitalized on the wire (`Name`,
// `TypeOfPokemon`, `Selected`); existing persisted rosters use the same keys,
// so they must not change.
//
// A valid roster holds exactly `ROSTER_SIZE` creatures, all drawn from the
// chosen type's member list. The same creature may appear more than once;
// nothing here deduplicates picks.
//
// `Lobby` is the placeholder record for a future matchmaking stage. Nothing
// creates or reads one yet.

use serde::{Deserialize, Serialize};

use crate::catalogue::{Catalogue, CreatureDetail};
use crate::error::RosterError;

/// Number of creatures in every roster.
pub const ROSTER_SIZE: usize = 3;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterSelection {
    /// The user's display name as the client reported it.
    #[serde(rename = "Name")]
    pub name: String,
    /// Name of the chosen type group.
    #[serde(rename = "TypeOfPokemon")]
    pub type_name: String,
    /// The picked creatures, in pick order.
    #[serde(rename = "Selected")]
    pub selected: Vec<CreatureDetail>,
}

impl RosterSelection {
    /// Check the roster against `catalogue`: right size, a known type, and
    /// every pick present in that type's member list (matched by name).
    pub fn validate_against(&self, catalogue: &Catalogue) -> Result<(), RosterError> {
        if self.selected.len() != ROSTER_SIZE {
            return Err(RosterError::WrongSize {
                expected: ROSTER_SIZE,
                got: self.selected.len(),
            });
        }
        let group = catalogue
            .group(&self.type_name)
            .ok_or_else(|| RosterError::UnknownType(self.type_name.clone()))?;
        for pick in &self.selected {
            if !group.has_member(&pick.name) {
                return Err(RosterError::NotAMember {
                    type_name: self.type_name.clone(),
                    creature: pick.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Rosters that opted into starting a game together. Inert.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lobby {
    #[serde(rename = "ID")]
    pub id: u32,
    #[serde(rename = "PLAYERS")]
    pub players: Vec<RosterSelection>,
}
