//! Declaration macros.
//!
//! `orm_entity!` declares a record together with its reflected schema and
//! accessors; `orm_enum!` declares an enumeration stored as its underlying
//! integer; `orm_external!` maps a type through a shadow record.

/// Declares a mapped record.
///
/// ```
/// sqlorm::orm_entity! {
///     #[derive(Debug, Clone, Default, PartialEq)]
///     pub struct Vertex as "vertex" {
///         pub id: i64,
///         pub x: f64,
///         pub y: f64 => "y_coord",
///     }
/// }
///
/// sqlorm::orm_entity! {
///     #[derive(Debug, Clone, Default, PartialEq)]
///     pub struct Polygon as "polygon" {
///         pub id: i64,
///         pub name: Option<String>,
///     }
///     children {
///         pub vertices: Vec<Vertex>,
///     }
/// }
///
/// use sqlorm::Entity;
/// assert_eq!(Polygon::schema().vectors.len(), 1);
/// ```
///
/// The first field is the primary key unless the struct is marked
/// `[keyless]` after its name. The table name defaults to the struct name.
/// Mapped records must implement `Default`.
#[macro_export]
macro_rules! orm_entity {
    (@table $name:ident) => { stringify!($name) };
    (@table $name:ident $table:literal) => { $table };
    (@column $field:ident) => { stringify!($field) };
    (@column $field:ident $column:literal) => { $column };
    (@keyed) => { true };
    (@keyed keyless) => { false };
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident $(as $table:literal)? $([$flag:ident])? {
            $( $(#[$fmeta:meta])* $fvis:vis $field:ident : $fty:ty $(=> $column:literal)? ),+ $(,)?
        }
        $( children {
            $( $(#[$vmeta:meta])* $vvis:vis $vfield:ident : Vec<$vty:ty> ),+ $(,)?
        } )?
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $(#[$fmeta])* $fvis $field: $fty, )+
            $($( $(#[$vmeta])* $vvis $vfield: ::std::vec::Vec<$vty>, )+)?
        }

        impl $crate::Record for $name {
            fn values(&self) -> ::std::vec::Vec<&dyn $crate::Value> {
                ::std::vec![$( &self.$field as &dyn $crate::Value ),+]
            }

            fn values_mut(&mut self) -> ::std::vec::Vec<&mut dyn $crate::Value> {
                ::std::vec![$( &mut self.$field as &mut dyn $crate::Value ),+]
            }

            fn children(&self) -> ::std::vec::Vec<&dyn $crate::Children> {
                ::std::vec![$($( &self.$vfield as &dyn $crate::Children ),+)?]
            }

            fn children_mut(&mut self) -> ::std::vec::Vec<&mut dyn $crate::Children> {
                ::std::vec![$($( &mut self.$vfield as &mut dyn $crate::Children ),+)?]
            }
        }

        impl $crate::Entity for $name {
            fn schema() -> &'static $crate::TableSchema {
                static SCHEMA: $crate::__private::Lazy<$crate::TableSchema> =
                    $crate::__private::Lazy::new(|| {
                        $crate::TableSchema::new(
                            $crate::orm_entity!(@table $name $($table)?),
                            stringify!($name),
                            $crate::orm_entity!(@keyed $($flag)?),
                            ::std::vec![$(
                                $crate::FieldSchema::of::<$fty>(
                                    stringify!($field),
                                    $crate::orm_entity!(@column $field $($column)?),
                                )
                            ),+],
                            ::std::vec![$($(
                                $crate::VectorSchema::of::<$vty>(stringify!($vfield))
                            ),+)?],
                        )
                    });
                &SCHEMA
            }
        }

        impl $crate::Value for $name {
            fn column(&self) -> $crate::Column<'_> {
                $crate::Column::Composite(self)
            }

            fn column_mut(&mut self) -> $crate::ColumnMut<'_> {
                $crate::ColumnMut::Composite(self)
            }
        }

        impl $crate::Field for $name {
            const SQL_TYPE: $crate::SqlType = $crate::SqlType::Composite;

            fn nested() -> ::std::option::Option<&'static $crate::TableSchema> {
                ::std::option::Option::Some(<Self as $crate::Entity>::schema())
            }
        }
    };
}

/// Declares an enumeration stored through its underlying integer type.
///
/// The first variant is the `Default`; do not derive `Default` on it.
///
/// ```
/// sqlorm::orm_enum! {
///     #[derive(Debug, Clone, Copy, PartialEq, Eq)]
///     pub enum Layer: i16 {
///         Metal1 = 1,
///         Metal2 = 2,
///         Via = -1,
///     }
/// }
///
/// assert_eq!(Layer::Via.to_repr(), -1);
/// assert_eq!(Layer::default(), Layer::Metal1);
/// ```
#[macro_export]
macro_rules! orm_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident : $repr:ident {
            $first:ident = $first_value:literal $(, $variant:ident = $value:literal)* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr($repr)]
        $vis enum $name {
            $first = $first_value,
            $( $variant = $value, )*
        }

        impl $name {
            /// Underlying integer value of this variant
            pub fn to_repr(&self) -> $repr {
                match self {
                    Self::$first => $first_value,
                    $( Self::$variant => $value, )*
                }
            }
        }

        impl ::std::default::Default for $name {
            fn default() -> Self {
                Self::$first
            }
        }

        impl ::std::convert::TryFrom<$repr> for $name {
            type Error = $crate::OrmError;

            fn try_from(raw: $repr) -> $crate::Result<Self> {
                match raw {
                    $first_value => Ok(Self::$first),
                    $( $value => Ok(Self::$variant), )*
                    _ => Err($crate::OrmError::Conversion(format!(
                        "{} is not a valid {}",
                        raw,
                        stringify!($name)
                    ))),
                }
            }
        }

        impl $crate::Value for $name {
            fn column(&self) -> $crate::Column<'_> {
                $crate::Column::Scalar($crate::SqlValue::Integer(self.to_repr() as i64))
            }

            fn column_mut(&mut self) -> $crate::ColumnMut<'_> {
                $crate::ColumnMut::Scalar(self)
            }
        }

        impl $crate::Slot for $name {
            fn set(
                &mut self,
                value: $crate::__private::ValueRef<'_>,
            ) -> $crate::__private::FromSqlResult<()> {
                let raw = <$repr as $crate::__private::FromSql>::column_result(value)?;
                *self = <Self as ::std::convert::TryFrom<$repr>>::try_from(raw)
                    .map_err(|_| $crate::__private::FromSqlError::OutOfRange(raw as i64))?;
                Ok(())
            }

            fn reset(&mut self) {
                *self = Self::$first;
            }
        }

        impl $crate::Field for $name {
            const SQL_TYPE: $crate::SqlType = <$repr as $crate::Field>::SQL_TYPE;
        }
    };
}

/// Maps a type that implements [`Shadowed`](crate::Shadowed) as an External field.
///
/// Binding converts the value into its shadow record and binds the shadow's
/// columns; fetching fills a fresh shadow and converts it back.
#[macro_export]
macro_rules! orm_external {
    ($ty:ty) => {
        impl $crate::Value for $ty {
            fn column(&self) -> $crate::Column<'_> {
                $crate::Column::External(::std::boxed::Box::new(
                    <$ty as $crate::Shadowed>::to_shadow(self),
                ))
            }

            fn column_mut(&mut self) -> $crate::ColumnMut<'_> {
                $crate::ColumnMut::External(self)
            }
        }

        impl $crate::ExternalSlot for $ty {
            fn with_shadow(
                &mut self,
                visit: &mut dyn FnMut(&mut dyn $crate::Record) -> $crate::Result<bool>,
            ) -> $crate::Result<bool> {
                let mut shadow =
                    <<$ty as $crate::Shadowed>::Shadow as ::std::default::Default>::default();
                let present = visit(&mut shadow)?;
                *self = if present {
                    <$ty as $crate::Shadowed>::from_shadow(shadow)?
                } else {
                    <$ty as ::std::default::Default>::default()
                };
                Ok(present)
            }
        }

        impl $crate::Field for $ty {
            const SQL_TYPE: $crate::SqlType = $crate::SqlType::External;

            fn nested() -> ::std::option::Option<&'static $crate::TableSchema> {
                static SCHEMA: $crate::__private::Lazy<$crate::TableSchema> =
                    $crate::__private::Lazy::new(|| {
                        <<$ty as $crate::Shadowed>::Shadow as $crate::Entity>::schema()
                            .projected(::std::any::type_name::<$ty>())
                    });
                ::std::option::Option::Some(&SCHEMA)
            }
        }
    };
}
