//! # Feature: Persona Store
//!
//! Fixed set of chat personas. Each persona carries a system instruction, a list
//! of few-shot training examples, and display metadata for the persona picker.
//! The built-in catalogue is embedded from prompt/personas.yaml at compile time
//! and can be replaced at startup with a YAML file of the same shape.
//!
//! - **Version**: 1.0.0
//! - **Since**: 1.0.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.0.0: Initial release with YAML catalogue and startup override

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

const BUILTIN_CATALOGUE: &str = include_str!("../../../prompt/personas.yaml");

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrainingExample {
    pub user_input: String,
    pub expected_response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub system_instruction: String,
    #[serde(default)]
    pub training_examples: Vec<TrainingExample>,
    /// Tone named in the response guidelines, e.g. "Hinglish"
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub greeting: String,
}

/// Public view of a persona served to the front end (no prompt material)
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PersonaSummary {
    pub id: String,
    pub name: String,
    pub title: String,
    pub description: String,
    pub avatar: Option<String>,
    pub specialties: Vec<String>,
    pub greeting: String,
}

impl From<&Persona> for PersonaSummary {
    fn from(p: &Persona) -> Self {
        PersonaSummary {
            id: p.id.clone(),
            name: p.name.clone(),
            title: p.title.clone(),
            description: p.description.clone(),
            avatar: p.avatar.clone(),
            specialties: p.specialties.clone(),
            greeting: p.greeting.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Catalogue {
    personas: Vec<Persona>,
}

#[derive(Debug, Clone)]
pub struct PersonaManager {
    personas: HashMap<String, Persona>,
}

impl PersonaManager {
    /// The catalogue compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::from_yaml_str(BUILTIN_CATALOGUE).context("Built-in persona catalogue is invalid")
    }

    /// Load a catalogue from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read persona catalogue {}", path.display()))?;
        Self::from_yaml_str(&contents)
            .with_context(|| format!("Invalid persona catalogue {}", path.display()))
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let catalogue: Catalogue = serde_yaml::from_str(yaml)?;
        Self::from_personas(catalogue.personas)
    }

    pub fn from_personas(personas: Vec<Persona>) -> Result<Self> {
        let mut map = HashMap::new();

        for persona in personas {
            if persona.id.is_empty()
                || !persona
                    .id
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
            {
                anyhow::bail!("Persona id must be lowercase: {:?}", persona.id);
            }
            if persona.name.trim().is_empty() {
                anyhow::bail!("Persona {} has no name", persona.id);
            }
            if persona.system_instruction.trim().is_empty() {
                anyhow::bail!("Persona {} has no system instruction", persona.id);
            }
            if map.contains_key(&persona.id) {
                anyhow::bail!("Duplicate persona id: {}", persona.id);
            }
            map.insert(persona.id.clone(), persona);
        }

        if map.is_empty() {
            anyhow::bail!("Persona catalogue is empty");
        }

        Ok(PersonaManager { personas: map })
    }

    pub fn get_persona(&self, id: &str) -> Option<&Persona> {
        self.personas.get(id)
    }

    /// Personas ordered by id
    pub fn list_personas(&self) -> Vec<&Persona> {
        let mut list: Vec<&Persona> = self.personas.values().collect();
        list.sort_by(|a, b| a.id.cmp(&b.id));
        list
    }

    pub fn summaries(&self) -> BTreeMap<String, PersonaSummary> {
        self.personas
            .iter()
            .map(|(id, p)| (id.clone(), PersonaSummary::from(p)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.personas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.personas.is_empty()
    }
}
