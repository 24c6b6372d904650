//! Projections: what a query returns and how raw rows become Rust values.
//!
//! A [`Selection`] declares the SELECT items of a query and decodes each
//! raw row. Scalars decode to `Option<T>`, entities to their [`Entity`]
//! type, tuples to [`Tuple`], and records through [`RecordType`] by
//! property, field or constructor binding. Record bindings are checked when
//! the query is composed, before the store is involved.

use std::sync::Arc;

use ormq_proto::{Datum, EntityRecord, RecordBinding, Row, SelectItem, Shape, Value, ValueType};

use crate::error::Error;
use crate::expression::{Expression, TypedExpr};
use crate::path::{EntityPath, EntityRef, Path};
use crate::query::SubQuery;
use crate::value::{FromValue, SqlType};

/// A persistent entity type.
pub trait Entity: Sized {
    /// Catalog name of the entity.
    const NAME: &'static str;

    fn from_record(record: &EntityRecord) -> Result<Self, Error>;
}

/// Read a field of an entity record.
pub fn field<T: FromValue>(record: &EntityRecord, name: &str) -> Result<T, Error> {
    let value = record.get(name).ok_or_else(|| {
        Error::Decode(format!("{} record has no field `{name}`", record.entity))
    })?;
    T::from_value(value).map_err(|e| Error::Decode(format!("{}.{name}: {e}", record.entity)))
}

/// A to-one association of an entity.
///
/// Loaded when the owning row was fetched together with its target (a
/// fetch join); otherwise only the foreign key is known.
#[derive(Debug, Clone, PartialEq)]
pub enum Association<T> {
    Unloaded { key: Option<Value> },
    Loaded(Option<T>),
}

impl<T: Entity> Association<T> {
    /// Decode the association `relation` of `record`, keyed by `key_field`.
    pub fn decode(record: &EntityRecord, relation: &str, key_field: &str) -> Result<Self, Error> {
        match record.fetched(relation) {
            Some(target) => Ok(Association::Loaded(target.map(T::from_record).transpose()?)),
            None => Ok(Association::Unloaded {
                key: record.get(key_field).filter(|v| !v.is_null()).cloned(),
            }),
        }
    }
}

impl<T> Association<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, Association::Loaded(_))
    }

    /// The loaded target, if any.
    pub fn get(&self) -> Option<&T> {
        match self {
            Association::Loaded(target) => target.as_ref(),
            Association::Unloaded { .. } => None,
        }
    }
}

/// One projected item and its value type (`None` for whole entities).
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub item: SelectItem,
    pub value_type: Option<ValueType>,
}

/// Anything that can appear in a SELECT list.
pub trait Selectable {
    fn column(&self) -> Column;
}

fn typed_column<X: TypedExpr + ?Sized>(expr: &X, label: Option<&str>) -> Column {
    let item = match label {
        Some(label) => SelectItem::labelled(expr.to_expr(), label),
        None => SelectItem::expr(expr.to_expr()),
    };
    Column {
        item,
        value_type: Some(<X::Value as SqlType>::VALUE_TYPE),
    }
}

impl<T: SqlType> Selectable for Path<T> {
    fn column(&self) -> Column {
        typed_column(self, None)
    }
}

impl<T: SqlType> Selectable for Expression<T> {
    fn column(&self) -> Column {
        typed_column(self, self.label())
    }
}

impl<T: SqlType> Selectable for SubQuery<T> {
    fn column(&self) -> Column {
        typed_column(self, None)
    }
}

impl<E: Entity> Selectable for EntityPath<E> {
    fn column(&self) -> Column {
        Column {
            item: SelectItem::entity(self.alias()),
            value_type: None,
        }
    }
}

impl Selectable for Column {
    fn column(&self) -> Column {
        self.clone()
    }
}

impl<X: Selectable + ?Sized> Selectable for &X {
    fn column(&self) -> Column {
        (**self).column()
    }
}

/// An ordered list of select items, given as a Rust tuple of up to eight
/// items or a `Vec<Column>`.
pub trait TupleItems {
    fn columns(self) -> Vec<Column>;
}

macro_rules! tuple_items {
    ($($name:ident),+) => {
        impl<$($name: Selectable),+> TupleItems for ($($name,)+) {
            #[allow(non_snake_case)]
            fn columns(self) -> Vec<Column> {
                let ($($name,)+) = self;
                vec![$($name.column()),+]
            }
        }
    };
}

tuple_items!(A);
tuple_items!(A, B);
tuple_items!(A, B, C);
tuple_items!(A, B, C, D);
tuple_items!(A, B, C, D, E);
tuple_items!(A, B, C, D, E, F);
tuple_items!(A, B, C, D, E, F, G);
tuple_items!(A, B, C, D, E, F, G, H);

impl TupleItems for Vec<Column> {
    fn columns(self) -> Vec<Column> {
        self
    }
}

/// The declared output of a query.
pub trait Selection {
    type Output;

    fn columns(&self) -> Vec<Column>;

    fn shape(&self) -> Shape;

    /// Check the items against the output type. Runs at composition.
    fn validate(&self) -> Result<(), Error> {
        Ok(())
    }

    fn decode(&self, row: Row) -> Result<Self::Output, Error>;
}

fn single_value(row: Row) -> Result<Value, Error> {
    match row.data.into_iter().next() {
        Some(Datum::Value(value)) => Ok(value),
        Some(Datum::Entity(_)) => Err(Error::Decode("expected a value, got an entity".into())),
        None => Err(Error::Decode("row is empty".into())),
    }
}

fn decode_entity<E: Entity>(datum: Datum) -> Result<Option<E>, Error> {
    match datum {
        Datum::Entity(record) => record.as_ref().map(E::from_record).transpose(),
        Datum::Value(value) => Err(Error::Decode(format!(
            "expected a {} entity, got {value:?}",
            E::NAME
        ))),
    }
}

macro_rules! scalar_selection {
    ($($ty:ident),*) => {
        $(
            impl<T: SqlType> Selection for $ty<T> {
                type Output = Option<T>;

                fn columns(&self) -> Vec<Column> {
                    vec![self.column()]
                }

                fn shape(&self) -> Shape {
                    Shape::Scalar
                }

                fn decode(&self, row: Row) -> Result<Option<T>, Error> {
                    Option::<T>::from_value(&single_value(row)?)
                }
            }
        )*
    };
}

scalar_selection!(Path, Expression, SubQuery);

impl<E: Entity> Selection for EntityPath<E> {
    type Output = E;

    fn columns(&self) -> Vec<Column> {
        vec![self.column()]
    }

    fn shape(&self) -> Shape {
        Shape::Entity
    }

    fn decode(&self, row: Row) -> Result<E, Error> {
        let datum = row
            .data
            .into_iter()
            .next()
            .ok_or_else(|| Error::Decode("row is empty".into()))?;
        decode_entity(datum)?.ok_or_else(|| Error::Decode(format!("missing {} entity", E::NAME)))
    }
}

impl<X: Selection + ?Sized> Selection for &X {
    type Output = X::Output;

    fn columns(&self) -> Vec<Column> {
        (**self).columns()
    }

    fn shape(&self) -> Shape {
        (**self).shape()
    }

    fn validate(&self) -> Result<(), Error> {
        (**self).validate()
    }

    fn decode(&self, row: Row) -> Result<X::Output, Error> {
        (**self).decode(row)
    }
}

/// A row of heterogeneous items, addressed by expression or position.
#[derive(Debug, Clone)]
pub struct Tuple {
    columns: Arc<[Column]>,
    data: Vec<Datum>,
}

impl Tuple {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The value projected for `expr`.
    pub fn get<X: TypedExpr + ?Sized>(&self, expr: &X) -> Result<Option<X::Value>, Error> {
        let wanted = expr.to_expr();
        let index = self
            .columns
            .iter()
            .position(|c| c.item.as_expr() == Some(&wanted))
            .ok_or_else(|| {
                Error::ProjectionMismatch(format!("{wanted:?} is not part of the projection"))
            })?;
        self.get_at(index)
    }

    /// The value at `index`.
    pub fn get_at<T: FromValue>(&self, index: usize) -> Result<Option<T>, Error> {
        match self.data.get(index) {
            Some(Datum::Value(value)) => Option::<T>::from_value(value),
            Some(Datum::Entity(_)) => Err(Error::ProjectionMismatch(format!(
                "item {index} is an entity"
            ))),
            None => Err(Error::ProjectionMismatch(format!(
                "index {index} is out of range for {} items",
                self.data.len()
            ))),
        }
    }

    /// The entity projected for `entity`; `None` for an unmatched left join.
    pub fn entity<R: EntityRef>(&self, entity: &R) -> Result<Option<R::Entity>, Error> {
        let alias = entity.entity_path().alias();
        let index = self
            .columns
            .iter()
            .position(|c| matches!(&c.item, SelectItem::Entity { alias: a } if a == alias))
            .ok_or_else(|| {
                Error::ProjectionMismatch(format!("entity `{alias}` is not part of the projection"))
            })?;
        let datum = self.data.get(index).cloned().ok_or_else(|| {
            Error::ProjectionMismatch(format!("entity `{alias}` is missing from the row"))
        })?;
        decode_entity(datum)
    }
}

/// Tuple projection built by [`Projections::tuple`].
#[derive(Debug, Clone)]
pub struct TupleSelection {
    columns: Arc<[Column]>,
}

impl Selection for TupleSelection {
    type Output = Tuple;

    fn columns(&self) -> Vec<Column> {
        self.columns.to_vec()
    }

    fn shape(&self) -> Shape {
        Shape::Tuple
    }

    fn decode(&self, row: Row) -> Result<Tuple, Error> {
        if row.len() != self.columns.len() {
            return Err(Error::Decode(format!(
                "expected {} items, got {}",
                self.columns.len(),
                row.len()
            )));
        }
        Ok(Tuple {
            columns: self.columns.clone(),
            data: row.data,
        })
    }
}

/// A plain Rust type that projected items bind into.
///
/// Property and field binding match items to slots by name (an item's
/// label, otherwise its field name). Constructor binding is positional.
pub trait RecordType: Sized {
    const NAME: &'static str;

    /// Named slots and their types.
    const PROPERTIES: &'static [(&'static str, ValueType)];

    /// Constructor parameter types, if the type has one.
    const CONSTRUCTOR: Option<&'static [ValueType]> = None;

    /// Assign through the property setter for `name`.
    fn set_property(&mut self, name: &str, value: &Value) -> Result<(), Error>;

    /// Assign the field `name` directly.
    fn set_field(&mut self, name: &str, value: &Value) -> Result<(), Error> {
        self.set_property(name, value)
    }

    fn construct(_values: &[Value]) -> Result<Self, Error> {
        Err(Error::binding(format!("{} declares no constructor", Self::NAME)))
    }
}

/// Record projection built by [`Projections::bean`], [`Projections::fields`]
/// or [`Projections::constructor`].
pub struct RecordSelection<T> {
    columns: Arc<[Column]>,
    binding: RecordBinding,
    init: Option<fn() -> T>,
}

impl<T> Clone for RecordSelection<T> {
    fn clone(&self) -> Self {
        Self {
            columns: self.columns.clone(),
            binding: self.binding,
            init: self.init,
        }
    }
}

impl<T: RecordType> RecordSelection<T> {
    fn check_constructor(&self) -> Result<(), Error> {
        let params = T::CONSTRUCTOR
            .ok_or_else(|| Error::binding(format!("{} declares no constructor", T::NAME)))?;
        if params.len() != self.columns.len() {
            return Err(Error::binding(format!(
                "constructor of {} takes {} arguments, got {}",
                T::NAME,
                params.len(),
                self.columns.len()
            )));
        }
        for (index, (expected, column)) in params.iter().zip(self.columns.iter()).enumerate() {
            match column.value_type {
                Some(actual) if expected.accepts(actual) => {}
                Some(actual) => {
                    return Err(Error::binding(format!(
                        "argument {index} of {} expects {expected}, got {actual}",
                        T::NAME
                    )))
                }
                None => {
                    return Err(Error::binding(format!(
                        "argument {index} of {} cannot bind a whole entity",
                        T::NAME
                    )))
                }
            }
        }
        Ok(())
    }

    fn check_slots(&self) -> Result<(), Error> {
        for (index, column) in self.columns.iter().enumerate() {
            let slot = column.item.slot_name().ok_or_else(|| {
                Error::binding(format!(
                    "item {index} has no slot name for {}; label it with `as_`",
                    T::NAME
                ))
            })?;
            let (_, expected) = T::PROPERTIES
                .iter()
                .find(|(name, _)| *name == slot)
                .ok_or_else(|| Error::binding(format!("{} has no slot `{slot}`", T::NAME)))?;
            match column.value_type {
                Some(actual) if expected.accepts(actual) => {}
                Some(actual) => {
                    return Err(Error::binding(format!(
                        "slot `{slot}` of {} expects {expected}, got {actual}",
                        T::NAME
                    )))
                }
                None => {
                    return Err(Error::binding(format!(
                        "slot `{slot}` of {} cannot bind a whole entity",
                        T::NAME
                    )))
                }
            }
        }
        Ok(())
    }
}

impl<T: RecordType> Selection for RecordSelection<T> {
    type Output = T;

    fn columns(&self) -> Vec<Column> {
        self.columns.to_vec()
    }

    fn shape(&self) -> Shape {
        Shape::Record {
            target: T::NAME.to_string(),
            binding: self.binding,
        }
    }

    fn validate(&self) -> Result<(), Error> {
        match self.binding {
            RecordBinding::Constructor => self.check_constructor(),
            RecordBinding::Properties | RecordBinding::Fields => self.check_slots(),
        }
    }

    fn decode(&self, row: Row) -> Result<T, Error> {
        let values = row
            .data
            .into_iter()
            .map(|datum| match datum {
                Datum::Value(value) => Ok(value),
                Datum::Entity(_) => Err(Error::Decode("records cannot hold entities".into())),
            })
            .collect::<Result<Vec<_>, _>>()?;

        if self.binding == RecordBinding::Constructor {
            return T::construct(&values);
        }

        let init = self
            .init
            .ok_or_else(|| Error::binding(format!("{} cannot be default-constructed", T::NAME)))?;
        let mut record = init();
        for (column, value) in self.columns.iter().zip(&values) {
            let slot = column.item.slot_name().unwrap_or_default();
            match self.binding {
                RecordBinding::Fields => record.set_field(slot, value)?,
                _ => record.set_property(slot, value)?,
            }
        }
        Ok(record)
    }
}

/// A hand-written typed projection whose output is built from a [`Tuple`].
pub trait QueryProjection {
    type Output;

    fn columns(&self) -> Vec<Column>;

    fn construct(&self, tuple: &Tuple) -> Result<Self::Output, Error>;
}

/// Adapter running a [`QueryProjection`] as a selection.
#[derive(Debug, Clone)]
pub struct Projected<Q> {
    projection: Q,
    columns: Arc<[Column]>,
}

impl<Q: QueryProjection> Selection for Projected<Q> {
    type Output = Q::Output;

    fn columns(&self) -> Vec<Column> {
        self.columns.to_vec()
    }

    fn shape(&self) -> Shape {
        Shape::Tuple
    }

    fn decode(&self, row: Row) -> Result<Q::Output, Error> {
        let tuple = Tuple {
            columns: self.columns.clone(),
            data: row.data,
        };
        self.projection.construct(&tuple)
    }
}

/// Projection constructors.
pub struct Projections;

impl Projections {
    pub fn tuple(items: impl TupleItems) -> TupleSelection {
        TupleSelection {
            columns: items.columns().into(),
        }
    }

    /// Bind items to `T` through its property setters.
    pub fn bean<T: RecordType + Default>(items: impl TupleItems) -> RecordSelection<T> {
        Self::record(items, RecordBinding::Properties, Some(T::default))
    }

    /// Bind items to `T` by direct field assignment.
    pub fn fields<T: RecordType + Default>(items: impl TupleItems) -> RecordSelection<T> {
        Self::record(items, RecordBinding::Fields, Some(T::default))
    }

    /// Bind items to `T` through its constructor, in order.
    pub fn constructor<T: RecordType>(items: impl TupleItems) -> RecordSelection<T> {
        Self::record(items, RecordBinding::Constructor, None)
    }

    /// Run a typed [`QueryProjection`].
    pub fn projected<Q: QueryProjection>(projection: Q) -> Projected<Q> {
        let columns = projection.columns().into();
        Projected {
            projection,
            columns,
        }
    }

    fn record<T>(
        items: impl TupleItems,
        binding: RecordBinding,
        init: Option<fn() -> T>,
    ) -> RecordSelection<T> {
        RecordSelection {
            columns: items.columns().into(),
            binding,
            init,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::NumericExpr;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Default, PartialEq)]
    struct MemberDto {
        username: Option<String>,
        age: i32,
    }

    impl RecordType for MemberDto {
        const NAME: &'static str = "MemberDto";
        const PROPERTIES: &'static [(&'static str, ValueType)] =
            &[("username", ValueType::String), ("age", ValueType::Int32)];
        const CONSTRUCTOR: Option<&'static [ValueType]> =
            Some(&[ValueType::String, ValueType::Int32]);

        fn set_property(&mut self, name: &str, value: &Value) -> Result<(), Error> {
            match name {
                "username" => self.username = FromValue::from_value(value)?,
                "age" => self.age = FromValue::from_value(value)?,
                other => return Err(Error::binding(format!("unknown slot {other}"))),
            }
            Ok(())
        }

        fn construct(values: &[Value]) -> Result<Self, Error> {
            Ok(Self {
                username: FromValue::from_value(&values[0])?,
                age: FromValue::from_value(&values[1])?,
            })
        }
    }

    fn username() -> Path<String> {
        Path::new("m", "username")
    }

    fn age() -> Path<i32> {
        Path::new("m", "age")
    }

    fn row(values: Vec<Value>) -> Row {
        Row::new(values.into_iter().map(Datum::Value).collect())
    }

    #[test]
    fn test_tuple_lookup() {
        let selection = Projections::tuple((username(), age()));
        let tuple = selection
            .decode(row(vec![Value::from("member1"), Value::Int32(10)]))
            .unwrap();

        assert_eq!(tuple.get(&username()).unwrap(), Some("member1".to_string()));
        assert_eq!(tuple.get(&age()).unwrap(), Some(10));
        assert_eq!(tuple.get_at::<i32>(1).unwrap(), Some(10));
        assert!(matches!(
            tuple.get(&age().max()),
            Err(Error::ProjectionMismatch(_))
        ));
        assert!(matches!(
            tuple.get_at::<i32>(5),
            Err(Error::ProjectionMismatch(_))
        ));
    }

    #[test]
    fn test_constructor_binding_checks_types() {
        let ok = Projections::constructor::<MemberDto>((username(), age()));
        assert!(ok.validate().is_ok());

        let swapped = Projections::constructor::<MemberDto>((age(), username()));
        assert!(matches!(swapped.validate(), Err(Error::Binding(_))));

        let short = Projections::constructor::<MemberDto>((username(),));
        assert!(matches!(short.validate(), Err(Error::Binding(_))));
    }

    #[test]
    fn test_property_binding_by_label() {
        let unknown = Projections::bean::<MemberDto>((username().as_("name"), age()));
        assert!(matches!(unknown.validate(), Err(Error::Binding(_))));

        let avg = Projections::bean::<MemberDto>((username(), age().avg().as_("age")));
        assert!(matches!(avg.validate(), Err(Error::Binding(_))));

        let labelled = Projections::bean::<MemberDto>((username(), age().max().as_("age")));
        assert!(labelled.validate().is_ok());
        let dto = labelled
            .decode(row(vec![Value::from("member4"), Value::Int32(40)]))
            .unwrap();
        assert_eq!(
            dto,
            MemberDto {
                username: Some("member4".into()),
                age: 40
            }
        );
    }

    #[test]
    fn test_scalar_null_decodes_to_none() {
        assert_eq!(username().decode(row(vec![Value::Null])).unwrap(), None);
    }
}
