use super::{
    ArrayEngine, ArrayQuery, ArraySchema, AttributeSpec, Cell, CellValNum, EngineCapabilities,
    EngineError, Fragment, FragmentRow, GroupMember, MetadataValue, ObjectType, ResultRow, Scalar,
    condition,
};
use std::{
    collections::BTreeMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};
use tracing::trace;

///
/// MemoryEngine
///
/// In-process sparse array engine. Arrays keep their committed fragments
/// in commit order; a row's ordinal is its position across all fragments.
///

#[derive(Debug, Default)]
pub struct MemoryEngine {
    capabilities: EngineCapabilities,
    objects: RwLock<BTreeMap<String, Object>>,
}

#[derive(Debug)]
enum Object {
    Array(StoredArray),
    Group(Vec<GroupMember>),
}

#[derive(Debug)]
struct StoredArray {
    schema: ArraySchema,
    metadata: BTreeMap<String, MetadataValue>,
    fragments: Vec<Vec<FragmentRow>>,
}

impl MemoryEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine advertising a reduced capability set.
    #[must_use]
    pub fn with_capabilities(capabilities: EngineCapabilities) -> Self {
        Self {
            capabilities,
            objects: RwLock::default(),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Object>>, EngineError> {
        self.objects.read().map_err(|_| EngineError::Poisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Object>>, EngineError> {
        self.objects.write().map_err(|_| EngineError::Poisoned)
    }
}

fn array<'a>(
    objects: &'a BTreeMap<String, Object>,
    uri: &str,
) -> Result<&'a StoredArray, EngineError> {
    match objects.get(uri) {
        Some(Object::Array(array)) => Ok(array),
        Some(Object::Group(_)) => Err(EngineError::NotAnArray { uri: uri.into() }),
        None => Err(EngineError::NotFound { uri: uri.into() }),
    }
}

fn array_mut<'a>(
    objects: &'a mut BTreeMap<String, Object>,
    uri: &str,
) -> Result<&'a mut StoredArray, EngineError> {
    match objects.get_mut(uri) {
        Some(Object::Array(array)) => Ok(array),
        Some(Object::Group(_)) => Err(EngineError::NotAnArray { uri: uri.into() }),
        None => Err(EngineError::NotFound { uri: uri.into() }),
    }
}

impl ArrayEngine for MemoryEngine {
    fn capabilities(&self) -> EngineCapabilities {
        self.capabilities
    }

    fn object_type(&self, uri: &str) -> Option<ObjectType> {
        let objects = self.read().ok()?;
        objects.get(uri).map(|object| match object {
            Object::Array(_) => ObjectType::Array,
            Object::Group(_) => ObjectType::Group,
        })
    }

    fn create_group(&self, uri: &str) -> Result<(), EngineError> {
        let mut objects = self.write()?;
        if objects.contains_key(uri) {
            return Err(EngineError::AlreadyExists { uri: uri.into() });
        }
        objects.insert(uri.to_string(), Object::Group(Vec::new()));

        Ok(())
    }

    fn add_group_member(
        &self,
        group: &str,
        member_uri: &str,
        name: &str,
    ) -> Result<(), EngineError> {
        let mut objects = self.write()?;
        if !objects.contains_key(member_uri) {
            return Err(EngineError::NotFound {
                uri: member_uri.into(),
            });
        }

        match objects.get_mut(group) {
            Some(Object::Group(members)) => {
                if members.iter().any(|m| m.name == name) {
                    return Err(EngineError::AlreadyExists {
                        uri: format!("{group}#{name}"),
                    });
                }
                members.push(GroupMember {
                    uri: member_uri.to_string(),
                    name: name.to_string(),
                });
                Ok(())
            }
            Some(Object::Array(_)) => Err(EngineError::NotAGroup { uri: group.into() }),
            None => Err(EngineError::NotFound { uri: group.into() }),
        }
    }

    fn group_members(&self, uri: &str) -> Result<Vec<GroupMember>, EngineError> {
        let objects = self.read()?;
        match objects.get(uri) {
            Some(Object::Group(members)) => Ok(members.clone()),
            Some(Object::Array(_)) => Err(EngineError::NotAGroup { uri: uri.into() }),
            None => Err(EngineError::NotFound { uri: uri.into() }),
        }
    }

    fn create_array(&self, uri: &str, schema: ArraySchema) -> Result<(), EngineError> {
        let mut objects = self.write()?;
        if objects.contains_key(uri) {
            return Err(EngineError::AlreadyExists { uri: uri.into() });
        }

        trace!(
            uri,
            dimensions = schema.dimensions.len(),
            attributes = schema.attributes.len(),
            "create array"
        );
        objects.insert(
            uri.to_string(),
            Object::Array(StoredArray {
                schema,
                metadata: BTreeMap::new(),
                fragments: Vec::new(),
            }),
        );

        Ok(())
    }

    fn array_schema(&self, uri: &str) -> Result<ArraySchema, EngineError> {
        let objects = self.read()?;
        Ok(array(&objects, uri)?.schema.clone())
    }

    fn put_metadata(&self, uri: &str, key: &str, value: MetadataValue) -> Result<(), EngineError> {
        let mut objects = self.write()?;
        array_mut(&mut objects, uri)?
            .metadata
            .insert(key.to_string(), value);

        Ok(())
    }

    fn metadata(&self, uri: &str) -> Result<BTreeMap<String, MetadataValue>, EngineError> {
        let objects = self.read()?;
        Ok(array(&objects, uri)?.metadata.clone())
    }

    fn append_fragment(&self, uri: &str, fragment: Fragment) -> Result<(), EngineError> {
        if fragment.is_empty() {
            return Ok(());
        }

        let mut objects = self.write()?;
        let stored = array_mut(&mut objects, uri)?;
        for row in &fragment.rows {
            check_row(uri, &stored.schema, row)?;
        }

        trace!(uri, rows = fragment.len(), "append fragment");
        stored.fragments.push(fragment.rows);

        Ok(())
    }

    fn query(&self, uri: &str, query: &ArrayQuery) -> Result<Vec<ResultRow>, EngineError> {
        let objects = self.read()?;
        let stored = array(&objects, uri)?;
        let schema = &stored.schema;

        if let Some(cond) = &query.condition {
            condition::validate(schema, self.capabilities, cond)?;
        }

        let mut ranges = Vec::with_capacity(query.ranges.len());
        for range in &query.ranges {
            let index = schema.dimension_index(&range.dimension).ok_or_else(|| {
                EngineError::UnknownName {
                    name: range.dimension.clone(),
                }
            })?;
            ranges.push((index, &range.lower, &range.upper));
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        let mut out = Vec::new();
        let rows = stored.fragments.iter().flatten().zip(0u64..);

        for (row, ordinal) in rows.skip_while(|(_, ordinal)| *ordinal < query.min_ordinal) {
            if out.len() >= limit {
                break;
            }

            let in_ranges = ranges.iter().all(|(index, lower, upper)| {
                let coord = &row.coords[*index];
                coord.compare(lower).is_some_and(|o| o.is_ge())
                    && coord.compare(upper).is_some_and(|o| o.is_le())
            });
            if !in_ranges {
                continue;
            }

            let matched = query.condition.as_ref().is_none_or(|cond| {
                condition::evaluate(schema, cond, &row.coords, &row.cells) == Some(true)
            });
            if matched {
                out.push(ResultRow {
                    ordinal,
                    coords: row.coords.clone(),
                    cells: row.cells.clone(),
                });
            }
        }

        Ok(out)
    }

    fn fragment_count(&self, uri: &str) -> Result<usize, EngineError> {
        let objects = self.read()?;
        Ok(array(&objects, uri)?.fragments.len())
    }
}

fn check_row(uri: &str, schema: &ArraySchema, row: &FragmentRow) -> Result<(), EngineError> {
    let mismatch = |message: String| EngineError::SchemaMismatch {
        uri: uri.to_string(),
        message,
    };

    if row.coords.len() != schema.dimensions.len() {
        return Err(mismatch(format!(
            "expected {} coordinates, got {}",
            schema.dimensions.len(),
            row.coords.len()
        )));
    }
    for (dim, coord) in schema.dimensions.iter().zip(&row.coords) {
        if !dim.domain.contains(coord) {
            return Err(EngineError::OutOfDomain {
                dimension: dim.name.clone(),
                value: coord.to_string(),
            });
        }
    }

    if row.cells.len() != schema.attributes.len() {
        return Err(mismatch(format!(
            "expected {} cells, got {}",
            schema.attributes.len(),
            row.cells.len()
        )));
    }
    for (attr, cell) in schema.attributes.iter().zip(&row.cells) {
        check_cell(attr, cell.as_ref()).map_err(mismatch)?;
    }

    Ok(())
}

fn check_cell(attr: &AttributeSpec, cell: Option<&Cell>) -> Result<(), String> {
    let typed = |s: &Scalar| s.datatype() == attr.datatype;

    let ok = match (cell, attr.cell_val_num) {
        (None, _) => attr.nullable,
        (Some(Cell::Scalar(s)), CellValNum::Single) => typed(s),
        (Some(Cell::Scalar(s @ (Scalar::Text(_) | Scalar::Blob(_)))), CellValNum::Var) => typed(s),
        (Some(Cell::List(items)), CellValNum::Var) => items.iter().all(typed),
        _ => false,
    };

    if ok {
        Ok(())
    } else {
        Err(format!(
            "cell {cell:?} does not fit attribute '{}' ({}, {:?}, nullable={})",
            attr.name, attr.datatype, attr.cell_val_num, attr.nullable
        ))
    }
}
