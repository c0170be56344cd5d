// Catalogue data model: creature groups keyed by elemental type.
//
// The JSON shape follows the upstream creature API the catalogue document was
// built from, so a scraped document deserializes without translation:
//
//   [{ "id": 10, "name": "fire",
//      "damage_relations": { "double_damage_from": [{name, url}], ... },
//      "pokemon": [{ "pokemon": { name, url, stats: [...], types: [...] } }] }]
//
// Unknown fields are ignored and missing lists default to empty, since the
// upstream documents carry many fields this system never reads.
//
// `Catalogue` is the whole document (a bare JSON array). Lookups go by type
// name and by 1-based position, matching how the client presents choices.

use serde::{Deserialize, Serialize};

/// A `{name, url}` reference to another upstream resource (a type or a stat).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub name: String,
    #[serde(default)]
    pub url: String,
}

impl NamedRef {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// How a type interacts with other types in combat.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DamageRelations {
    #[serde(default)]
    pub double_damage_from: Vec<NamedRef>,
    #[serde(default)]
    pub double_damage_to: Vec<NamedRef>,
    #[serde(default)]
    pub half_damage_from: Vec<NamedRef>,
    #[serde(default)]
    pub half_damage_to: Vec<NamedRef>,
}

/// One named stat with its base value and effort value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatEntry {
    pub base_stat: i32,
    #[serde(default)]
    pub effort: i32,
    pub stat: NamedRef,
}

/// A type tag on a creature (`{"type": {name, url}}`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeTag {
    #[serde(rename = "type")]
    pub kind: NamedRef,
}

/// Everything the party builder knows about a single creature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatureDetail {
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub stats: Vec<StatEntry>,
    #[serde(default)]
    pub types: Vec<TypeTag>,
}

impl CreatureDetail {
    /// Base value of the stat called `stat_name`, if the creature has it.
    pub fn base_stat(&self, stat_name: &str) -> Option<i32> {
        self.stats
            .iter()
            .find(|s| s.stat.name == stat_name)
            .map(|s| s.base_stat)
    }

    /// Names of the creature's type tags, in order.
    pub fn type_names(&self) -> Vec<&str> {
        self.types.iter().map(|t| t.kind.name.as_str()).collect()
    }
}

/// Member wrapper: the upstream document nests each creature one level deep.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberEntry {
    pub pokemon: CreatureDetail,
}

/// All creatures of one elemental type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeGroup {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub damage_relations: DamageRelations,
    #[serde(default)]
    pub pokemon: Vec<MemberEntry>,
}

impl TypeGroup {
    /// The group's creatures in catalogue order.
    pub fn members(&self) -> impl Iterator<Item = &CreatureDetail> {
        self.pokemon.iter().map(|m| &m.pokemon)
    }

    /// Creature at 1-based `position`, or `None` when out of range.
    pub fn member_at(&self, position: usize) -> Option<&CreatureDetail> {
        position
            .checked_sub(1)
            .and_then(|i| self.pokemon.get(i))
            .map(|m| &m.pokemon)
    }

    pub fn member_count(&self) -> usize {
        self.pokemon.len()
    }

    pub fn has_member(&self, creature_name: &str) -> bool {
        self.members().any(|c| c.name == creature_name)
    }
}

/// The full list of type groups served to every client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Catalogue {
    pub groups: Vec<TypeGroup>,
}

impl Catalogue {
    pub fn new(groups: Vec<TypeGroup>) -> Self {
        Self { groups }
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn type_count(&self) -> usize {
        self.groups.len()
    }

    /// Type names in catalogue order.
    pub fn type_names(&self) -> Vec<&str> {
        self.groups.iter().map(|g| g.name.as_str()).collect()
    }

    /// Group at 1-based `position`, or `None` when out of range.
    pub fn group_at(&self, position: usize) -> Option<&TypeGroup> {
        position.checked_sub(1).and_then(|i| self.groups.get(i))
    }

    /// First group whose name is exactly `type_name`.
    pub fn group(&self, type_name: &str) -> Option<&TypeGroup> {
        self.groups.iter().find(|g| g.name == type_name)
    }

    /// Returns the first type id that appears on more than one group.
    pub fn first_duplicate_id(&self) -> Option<u32> {
        let mut seen = std::collections::BTreeSet::new();
        self.groups.iter().map(|g| g.id).find(|id| !seen.insert(*id))
    }
}
