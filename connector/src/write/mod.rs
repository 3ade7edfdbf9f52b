//! Writes through user stored procedures.
//!
//! Every user procedure is offered as a write target. Its input parameters become the
//! properties of a write schema, and each record is passed to one `EXECUTE PROCEDURE` call.

use firebird::catalog;
use firebird::executor::{Connection, ConnectionFactory, Statement};
use firebird::identifier::quote_identifier;
use firebird::types::{map_portable_type, map_source_ddl_type, native};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, error, info};

use crate::connection::{close_connection, fetch_all};
use crate::conversions::json_to_typed_cell;
use crate::error::{ConnectorError, ConnectorResult};
use crate::replication::named_record_data;
use crate::schema::{Direction, PortableProperty, PortableSchema};
use crate::types::{Record, RecordAck};

/// A user stored procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteStoredProcedure {
    pub procedure_name: String,
    pub procedure_id: String,
}

impl WriteStoredProcedure {
    /// Quoted procedure name, used as the write schema's id.
    pub fn safe_name(&self) -> String {
        quote_identifier(&self.procedure_name)
    }
}

/// Write form payload selecting the procedure to call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct WriteSettings {
    pub stored_procedure: String,
}

/// Lists user procedures by name.
pub async fn list_procedures<F>(factory: &F) -> ConnectorResult<Vec<WriteStoredProcedure>>
where
    F: ConnectionFactory,
{
    let mut connection = factory.connect(None).await?;
    let result = fetch_all(&mut connection, &Statement::new(catalog::PROCEDURES_QUERY)).await;
    let rows = close_connection(connection, result).await?;

    let procedures: Vec<WriteStoredProcedure> = rows
        .iter()
        .filter_map(|row| {
            Some(WriteStoredProcedure {
                procedure_name: row.get_string(catalog::PROCEDURE_NAME)?,
                procedure_id: row.get_string(catalog::PROCEDURE_ID).unwrap_or_default(),
            })
        })
        .collect();

    debug!(procedures = procedures.len(), "listed stored procedures");

    Ok(procedures)
}

/// Builds the write schema of `procedure` from its input parameters.
pub async fn schema_for_procedure<F>(
    factory: &F,
    procedure: &WriteStoredProcedure,
) -> ConnectorResult<PortableSchema>
where
    F: ConnectionFactory,
{
    let statement = Statement::new(catalog::PROCEDURE_PARAMETERS_QUERY)
        .bind(procedure.procedure_name.trim());

    let mut connection = factory.connect(None).await?;
    let result = fetch_all(&mut connection, &statement).await;
    let rows = close_connection(connection, result).await?;

    let properties = rows
        .iter()
        .filter_map(|row| {
            let name = row.get_string(catalog::PARAMETER_NAME)?;
            let data_type = row
                .get_string(catalog::DATA_TYPE)
                .unwrap_or_else(|| native::OTHER.to_string());
            let length = row.get_i64(catalog::CHARACTER_MAXIMUM_LENGTH);
            let precision = row.get_i64(catalog::DATA_PRECISION);
            let scale = row.get_i64(catalog::DATA_SCALE);

            let mut property = PortableProperty::new(
                &name,
                map_portable_type(&data_type, length),
                map_source_ddl_type(&data_type, length, precision, scale),
            )
            .with_nullable(true);
            property.id = property.name.clone();
            Some(property)
        })
        .collect();

    let safe_name = procedure.safe_name();
    Ok(PortableSchema {
        id: safe_name.clone(),
        name: safe_name.clone(),
        direction: Direction::Write,
        query: safe_name,
        properties,
        ..Default::default()
    })
}

/// JSON schema of the write form, offering every procedure by its safe name.
pub fn write_form_schema_json(procedures: &[WriteStoredProcedure]) -> String {
    let names: Vec<String> = procedures.iter().map(WriteStoredProcedure::safe_name).collect();

    json!({
        "type": "object",
        "properties": {
            "StoredProcedure": {
                "type": "string",
                "title": "Stored Procedure",
                "description": "Stored Procedure to call",
                "enum": names,
            },
        },
        "required": ["StoredProcedure"],
    })
    .to_string()
}

/// `EXECUTE PROCEDURE` call for `schema` with one placeholder per property.
pub fn execute_statement(schema: &PortableSchema, record: &Record) -> ConnectorResult<Statement> {
    let data = named_record_data(schema, &record.data_json)?;

    let params = schema
        .properties
        .iter()
        .map(|property| {
            let value = data.get(&property.name).unwrap_or(&Value::Null);
            json_to_typed_cell(value, property.property_type)
        })
        .collect::<ConnectorResult<Vec<_>>>()?;

    let procedure = if schema.has_query() {
        schema.query.trim().to_string()
    } else {
        quote_identifier(&schema.name)
    };

    let sql = if params.is_empty() {
        format!("EXECUTE PROCEDURE {procedure}")
    } else {
        let placeholders = vec!["?"; params.len()].join(", ");
        format!("EXECUTE PROCEDURE {procedure} ({placeholders})")
    };

    Ok(Statement::with_params(sql, params))
}

/// Passes `record` to the procedure of `schema` and acknowledges it.
pub async fn execute_procedure<F>(
    factory: &F,
    schema: &PortableSchema,
    record: &Record,
) -> RecordAck
where
    F: ConnectionFactory,
{
    let result = async {
        let statement = execute_statement(schema, record)?;

        let mut connection = factory.connect(None).await?;
        let result = connection
            .execute(&statement)
            .await
            .map(|_| ())
            .map_err(ConnectorError::from);
        close_connection(connection, result).await
    }
    .await;

    match result {
        Ok(()) => {
            info!(
                procedure = %schema.id,
                correlation_id = %record.correlation_id,
                "executed stored procedure"
            );
            RecordAck::success(&record.correlation_id)
        }
        Err(err) => {
            error!(procedure = %schema.id, error = %err, "error executing stored procedure");
            RecordAck::failure(&record.correlation_id, err.message())
        }
    }
}

#[cfg(test)]
mod tests {
    use firebird::types::{Cell, PropertyType};

    use super::*;

    fn schema() -> PortableSchema {
        let mut name = PortableProperty::new("NAME", PropertyType::String, "VARCHAR(50)");
        name.id = name.name.clone();
        let mut age = PortableProperty::new("AGE", PropertyType::Integer, "INTEGER");
        age.id = age.name.clone();

        PortableSchema {
            id: "\"ADD_PERSON\"".to_string(),
            name: "\"ADD_PERSON\"".to_string(),
            direction: Direction::Write,
            query: "\"ADD_PERSON\"".to_string(),
            properties: vec![name, age],
            ..Default::default()
        }
    }

    #[test]
    fn binds_values_in_property_order() {
        let record = Record {
            data_json: r#"{"AGE": 42, "NAME": "Ada"}"#.to_string(),
            ..Default::default()
        };

        let statement = execute_statement(&schema(), &record).unwrap();

        assert_eq!(statement.sql, "EXECUTE PROCEDURE \"ADD_PERSON\" (?, ?)");
        assert_eq!(statement.params, vec![Cell::from("Ada"), Cell::I64(42)]);
    }

    #[test]
    fn missing_values_are_bound_as_null() {
        let record = Record {
            data_json: r#"{"NAME": "Ada"}"#.to_string(),
            ..Default::default()
        };

        let statement = execute_statement(&schema(), &record).unwrap();

        assert_eq!(statement.params[1], Cell::Null);
    }

    #[test]
    fn form_lists_safe_procedure_names() {
        let procedures = [WriteStoredProcedure {
            procedure_name: "ADD_PERSON".to_string(),
            procedure_id: "1".to_string(),
        }];

        let form: Value = serde_json::from_str(&write_form_schema_json(&procedures)).unwrap();

        assert_eq!(form["properties"]["StoredProcedure"]["enum"], json!(["\"ADD_PERSON\""]));
        assert_eq!(form["required"], json!(["StoredProcedure"]));
    }
}
