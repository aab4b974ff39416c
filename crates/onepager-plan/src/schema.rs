use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::model::GenerationConfig;

/// Emit the JSON Schema for a generation config file.
pub fn config_json_schema() -> RootSchema {
    schema_for!(GenerationConfig)
}
