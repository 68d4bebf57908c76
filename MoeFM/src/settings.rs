//! Sous-commande `settings` : lecture et écriture de la configuration persistée

use anyhow::Result;
use clap::Subcommand;
use moeconfig::Config;
use serde_yaml::{Number, Value};

/// Valeur spéciale qui supprime la clé
pub const DELETE_MARKER: &str = "--delete";

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// Print the value stored at a dotted key
    Get { key: String },

    /// Store a value (integers are parsed, surrounding quotes stripped)
    Set {
        key: String,
        /// Value to store, or `--delete` to remove the key
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Remove a key
    Delete { key: String },

    /// Print the whole configuration as JSON
    Dump,
}

/// Résultat de l'interprétation d'une valeur saisie
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Delete,
    Store(Value),
}

/// Interprète une valeur de la ligne de commande
///
/// Un entier est stocké comme nombre ; sinon les guillemets englobants sont
/// retirés, ce qui permet de stocker `"30"` comme chaîne.
pub fn parse_value(raw: &str) -> SettingValue {
    if let Ok(number) = raw.parse::<i64>() {
        return SettingValue::Store(Value::Number(Number::from(number)));
    }

    let value = raw.trim_matches('"');
    if value == DELETE_MARKER {
        SettingValue::Delete
    } else {
        SettingValue::Store(Value::String(value.to_string()))
    }
}

/// Exécute une action et renvoie la sortie à afficher
pub fn run(config: &Config, action: SettingsAction) -> Result<Option<String>> {
    match action {
        SettingsAction::Get { key } => {
            let value = config.get_path(&key).unwrap_or(Value::Null);
            Ok(Some(serde_json::to_string(&value)?))
        }
        SettingsAction::Set { key, value } => {
            match parse_value(&value) {
                SettingValue::Delete => {
                    config.delete_path(&key)?;
                }
                SettingValue::Store(value) => config.set_path(&key, value)?,
            }
            Ok(None)
        }
        SettingsAction::Delete { key } => {
            config.delete_path(&key)?;
            Ok(None)
        }
        SettingsAction::Dump => Ok(Some(serde_json::to_string(&config.snapshot())?)),
    }
}
