//! Game-specific tables: engine types, variable type keywords and engine
//! function names.
//!
//! The tables here cover the commonly seen entries; everything else falls
//! back to a deterministic synthetic spelling so output stays stable across
//! games we only partially know.

use std::fmt;
use std::str::FromStr;

use crate::model::VariableType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameId {
    Nwn,
    Nwn2,
    Kotor,
    Kotor2,
    Jade,
    Witcher,
    DragonAge,
    DragonAge2,
}

impl FromStr for GameId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nwn" => Ok(GameId::Nwn),
            "nwn2" => Ok(GameId::Nwn2),
            "kotor" => Ok(GameId::Kotor),
            "kotor2" => Ok(GameId::Kotor2),
            "jade" => Ok(GameId::Jade),
            "witcher" => Ok(GameId::Witcher),
            "dragonage" => Ok(GameId::DragonAge),
            "dragonage2" => Ok(GameId::DragonAge2),
            _ => Err(format!("unknown game: {:?}", s)),
        }
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GameId::Nwn => "nwn",
            GameId::Nwn2 => "nwn2",
            GameId::Kotor => "kotor",
            GameId::Kotor2 => "kotor2",
            GameId::Jade => "jade",
            GameId::Witcher => "witcher",
            GameId::DragonAge => "dragonage",
            GameId::DragonAge2 => "dragonage2",
        };
        f.write_str(s)
    }
}

/// Game-specific engine-type names, indexed by engine-type slot. An empty
/// string marks a slot whose meaning is unknown for that game.
fn engine_types(game: GameId) -> &'static [&'static str] {
    match game {
        GameId::Nwn | GameId::Nwn2 => &["effect", "event", "location", "talent", "itemproperty"],
        GameId::Kotor | GameId::Kotor2 => &["effect", "event", "location", "talent"],
        GameId::Jade => &[],
        GameId::Witcher => &["", "", "", ""],
        GameId::DragonAge | GameId::DragonAge2 => {
            &["event", "location", "command", "effect", "itemproperty", "player"]
        }
    }
}

pub fn get_engine_type_count(game: GameId) -> usize {
    engine_types(game).len()
}

/// The game-specific name of engine type `index`, or "" when unknown.
pub fn get_engine_type_name(game: GameId, index: usize) -> &'static str {
    engine_types(game).get(index).copied().unwrap_or("")
}

pub fn get_generic_engine_type_name(index: usize) -> String {
    format!("E{}", index)
}

/// The NSS keyword for a variable type. Engine types resolve through the
/// game table, falling back to the generic `E<n>` spelling.
pub fn get_variable_type_name(vtype: VariableType, game: GameId) -> String {
    match vtype {
        VariableType::Void => "void".to_string(),
        VariableType::Int => "int".to_string(),
        VariableType::Float => "float".to_string(),
        VariableType::String => "string".to_string(),
        VariableType::Resource => "resource".to_string(),
        VariableType::Object => "object".to_string(),
        VariableType::Vector => "vector".to_string(),
        VariableType::Struct => "struct".to_string(),
        VariableType::Any => "any".to_string(),
        VariableType::Engine(i) => {
            let name = get_engine_type_name(game, i as usize);
            if name.is_empty() {
                get_generic_engine_type_name(i as usize)
            } else {
                name.to_string()
            }
        }
    }
}

/// The engine API function called by an ACTION instruction.
///
/// Ids beyond the known table render as `func_<id>` so ACTION lines stay
/// readable for games with incomplete tables.
pub fn get_function_name(game: GameId, id: i32) -> String {
    let table: &[&str] = match game {
        GameId::Nwn | GameId::Nwn2 => NWN_FUNCTIONS,
        GameId::Kotor | GameId::Kotor2 => KOTOR_FUNCTIONS,
        _ => &[],
    };
    if id >= 0 {
        if let Some(name) = table.get(id as usize) {
            if !name.is_empty() {
                return (*name).to_string();
            }
        }
    }
    format!("func_{}", id)
}

static NWN_FUNCTIONS: &[&str] = &[
    "Random",
    "PrintString",
    "PrintFloat",
    "FloatToString",
    "PrintInteger",
    "PrintObject",
    "AssignCommand",
    "DelayCommand",
    "ExecuteScript",
    "ClearAllActions",
    "SetFacing",
    "SetCalendar",
    "SetTime",
    "GetCalendarYear",
    "GetCalendarMonth",
    "GetCalendarDay",
    "GetTimeHour",
    "GetTimeMinute",
    "GetTimeSecond",
    "GetTimeMillisecond",
    "ActionRandomWalk",
    "ActionMoveToLocation",
    "ActionMoveToObject",
    "ActionMoveAwayFromObject",
    "GetArea",
    "GetEnteringObject",
    "GetExitingObject",
    "GetPosition",
    "GetFacing",
    "GetItemPossessor",
    "GetItemPossessedBy",
    "ActionEquipItem",
    "ActionUnequipItem",
    "ActionPickUpItem",
    "ActionPutDownItem",
    "GetLastAttacker",
    "ActionAttack",
    "GetNearestCreature",
    "ActionSpeakString",
    "ActionPlayAnimation",
    "GetDistanceToObject",
];

static KOTOR_FUNCTIONS: &[&str] = &[
    "Random",
    "PrintString",
    "PrintFloat",
    "FloatToString",
    "PrintInteger",
    "PrintObject",
    "AssignCommand",
    "DelayCommand",
    "ExecuteScript",
    "ClearAllActions",
    "SetFacing",
    "SwitchPlayerCharacter",
    "SetTime",
    "SetPartyLeader",
    "SetAreaUnescapable",
    "GetAreaUnescapable",
    "GetTimeHour",
    "GetTimeMinute",
    "GetTimeSecond",
    "GetTimeMillisecond",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_type_tables() {
        assert_eq!(get_engine_type_count(GameId::Jade), 0);
        assert_eq!(get_engine_type_count(GameId::Nwn), 5);
        assert_eq!(get_engine_type_name(GameId::Nwn, 0), "effect");
        assert_eq!(get_engine_type_name(GameId::Witcher, 2), "");
        assert_eq!(get_engine_type_name(GameId::Nwn, 99), "");
        assert_eq!(get_generic_engine_type_name(3), "E3");
    }

    #[test]
    fn variable_type_names() {
        assert_eq!(get_variable_type_name(VariableType::Int, GameId::Nwn), "int");
        assert_eq!(
            get_variable_type_name(VariableType::Engine(0), GameId::Nwn),
            "effect"
        );
        assert_eq!(
            get_variable_type_name(VariableType::Engine(0), GameId::Witcher),
            "E0"
        );
    }

    #[test]
    fn function_names_fall_back() {
        assert_eq!(get_function_name(GameId::Nwn, 1), "PrintString");
        assert_eq!(get_function_name(GameId::Jade, 1), "func_1");
        assert_eq!(get_function_name(GameId::Nwn, 100000), "func_100000");
    }
}
