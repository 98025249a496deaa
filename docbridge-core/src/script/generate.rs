//! Script generator: deterministic rendering of a model into mongo-shell
//! style script text.
//!
//! Statement order is fixed: shard-key commands against the admin database,
//! then database selection, then per-entity collection creation and index
//! statements, then optional sample inserts. Every statement stands alone
//! separated by blank lines so the apply engine can parse the script as a
//! whole program.

use serde_json::Value;

use crate::codec;
use crate::error::{DocBridgeError, Result};
use crate::index;
use crate::model::{ContainerModel, EntityModel};

/// Operating context of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptOrigin {
    /// Interactive UI: sample data is split into its own block when requested
    Interactive,
    /// Headless/batch run: sample data is bundled into the one script
    Batch,
}

/// Options governing one generation run.
#[derive(Debug, Clone, Copy)]
pub struct GenerateOptions {
    pub origin: ScriptOrigin,
    pub include_samples: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            origin: ScriptOrigin::Batch,
            include_samples: false,
        }
    }
}

/// A labeled script section returned in split form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptBlock {
    pub title: String,
    pub script: String,
}

/// Generator output: one combined script, or a main script plus a separately
/// labeled sample-data block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutput {
    Combined(String),
    Split(Vec<ScriptBlock>),
}

/// Renders the model as script text.
///
/// Samples are bundled into the script when the origin is not interactive.
/// An interactive caller that explicitly requests samples gets them as a
/// separate block; otherwise samples are left out entirely.
pub fn generate(
    container: &ContainerModel,
    entities: &[EntityModel],
    options: &GenerateOptions,
) -> Result<ScriptOutput> {
    let mut sections = Vec::new();

    if let Some(shard_section) = shard_key_section(container, entities) {
        sections.push(shard_section);
    }

    sections.push(format!("use {};", container.db_id));

    for entity in entities {
        sections.push(entity_section(container, entity));
    }

    let script = sections.join("\n\n");

    let bundle_samples = options.origin != ScriptOrigin::Interactive;
    if bundle_samples {
        let samples = sample_statements(container, entities)?;
        let script = if samples.is_empty() {
            script
        } else {
            format!("{script}\n\n{}", samples.join("\n\n"))
        };
        return Ok(ScriptOutput::Combined(script));
    }

    if !options.include_samples {
        return Ok(ScriptOutput::Combined(script));
    }

    let samples = sample_statements(container, entities)?;
    let mut sample_script = vec![format!("use {};", container.db_id)];
    sample_script.extend(samples);

    Ok(ScriptOutput::Split(vec![
        ScriptBlock {
            title: "Database script".to_string(),
            script,
        },
        ScriptBlock {
            title: "Sample data".to_string(),
            script: sample_script.join("\n\n"),
        },
    ]))
}

/// Shard-key assignment commands, run against the admin database. Only
/// activated entities are sharded.
fn shard_key_section(container: &ContainerModel, entities: &[EntityModel]) -> Option<String> {
    let shard_key = container.shard_key.as_deref().filter(|key| !key.is_empty())?;

    let commands: Vec<String> = entities
        .iter()
        .filter(|entity| entity.is_activated)
        .map(|entity| {
            format!(
                "db.runCommand({{ \"shardCollection\": \"{}.{}\", \"key\": {{ \"{}\": \"hashed\" }} }});",
                container.db_id, entity.name, shard_key
            )
        })
        .collect();

    if commands.is_empty() {
        return None;
    }

    Some(format!("use admin;\n\n{}", commands.join("\n\n")))
}

/// Collection creation plus index statements for one entity. Inactive
/// entities keep the identical statement body, wrapped in a comment block.
fn entity_section(container: &ContainerModel, entity: &EntityModel) -> String {
    let mut statements = vec![format!("db.createCollection(\"{}\");", entity.name)];

    statements.extend(index::to_statements(
        &entity.name,
        &entity.unique_keys,
        container.shard_key.as_deref(),
        &entity.indexes,
        Some(container.ttl),
    ));

    let body = statements.join("\n\n");

    if entity.is_activated {
        body
    } else {
        format!("/*\n{body}\n*/")
    }
}

fn sample_statements(
    container: &ContainerModel,
    entities: &[EntityModel],
) -> Result<Vec<String>> {
    let mut statements = Vec::new();

    for entity in entities {
        for sample in &entity.samples {
            statements.push(format!(
                "db.getCollection(\"{}\").insert({});",
                entity.name,
                render_sample(sample, container, entity)?
            ));
        }
    }

    Ok(statements)
}

/// Renders one sample document: the document-kind discriminator field is
/// injected when the container defines one, then the pretty-printed JSON is
/// decoded back into literal syntax.
fn render_sample(
    sample: &Value,
    container: &ContainerModel,
    entity: &EntityModel,
) -> Result<String> {
    let adjusted = match (&container.doc_type_field, sample) {
        (Some(field), Value::Object(fields)) if !field.is_empty() => {
            let mut fields = fields.clone();
            fields.insert(field.clone(), Value::String(entity.name.clone()));
            Value::Object(fields)
        }
        _ => sample.clone(),
    };

    let text = serde_json::to_string_pretty(&adjusted)
        .map_err(|e| DocBridgeError::serialization("sample document", e))?;

    Ok(codec::decode(&text))
}
