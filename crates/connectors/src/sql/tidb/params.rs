use model::{core::identifiers::PointId, execution::job::TargetSchema, records::record::Record};
use mysql_async::{Params, Value as MySqlValue};

pub struct TiDbParam(MySqlValue);

impl TiDbParam {
    pub fn from_id(id: &PointId) -> Self {
        match id {
            PointId::Num(n) => TiDbParam(MySqlValue::UInt(*n)),
            PointId::Uuid(s) => TiDbParam(MySqlValue::Bytes(s.clone().into_bytes())),
        }
    }

    pub fn text(value: &str) -> Self {
        TiDbParam(MySqlValue::Bytes(value.as_bytes().to_vec()))
    }

    pub fn into_inner(self) -> MySqlValue {
        self.0
    }
}

/// Positional parameters bound in column order of an insert or update.
pub struct TiDbParamStore {
    pub params: Vec<TiDbParam>,
}

impl TiDbParamStore {
    /// `id, vector[, payload]` for every record, matching a multi-row insert.
    pub fn for_insert(schema: &TargetSchema, records: &[Record]) -> Self {
        let per_row = if schema.payload_column.is_some() { 3 } else { 2 };
        let mut params = Vec::with_capacity(records.len() * per_row);
        for record in records {
            params.push(TiDbParam::from_id(&record.id));
            params.push(TiDbParam::text(&record.vector_literal()));
            if schema.payload_column.is_some() {
                params.push(TiDbParam::text(&record.payload_literal()));
            }
        }
        TiDbParamStore { params }
    }

    /// `vector[, payload], id` for a single record update.
    pub fn for_update(schema: &TargetSchema, record: &Record) -> Self {
        let mut params = vec![TiDbParam::text(&record.vector_literal())];
        if schema.payload_column.is_some() {
            params.push(TiDbParam::text(&record.payload_literal()));
        }
        params.push(TiDbParam::from_id(&record.id));
        TiDbParamStore { params }
    }

    pub fn params(self) -> Params {
        Params::Positional(self.params.into_iter().map(TiDbParam::into_inner).collect())
    }
}
