//! Declarative introspection for record types.

/// Implement [`Materialize`](crate::materialize::Materialize) for a struct
/// built from `Default` with assignable fields.
///
/// Every listed field becomes a slot; unlisted fields keep their default.
/// The type also becomes usable as a nested member.
///
/// ```
/// use ingestguard::materialize_properties;
///
/// #[derive(Debug, Default)]
/// struct Trade {
///     symbol: String,
///     quantity: i64,
///     price: Option<f64>,
/// }
///
/// materialize_properties!(Trade { symbol: String, quantity: i64, price: Option<f64> });
/// ```
#[macro_export]
macro_rules! materialize_properties {
    ($ty:ty { $($field:ident : $fty:ty),* $(,)? }) => {
        impl $crate::materialize::Materialize for $ty {
            fn shape() -> $crate::materialize::Shape<Self> {
                $crate::materialize::Shape::Properties($crate::materialize::PropertyShape {
                    create: <$ty as ::core::default::Default>::default,
                    members: vec![
                        $(
                            $crate::materialize::Member {
                                slot: $crate::materialize::Slot {
                                    name: stringify!($field),
                                    type_name: ::core::any::type_name::<$fty>(),
                                },
                                assign: |target, arg| {
                                    target.$field = arg.convert::<$fty>()?;
                                    ::core::result::Result::Ok(())
                                },
                            }
                        ),*
                    ],
                })
            }
        }

        impl $crate::materialize::FromField for $ty {
            fn from_field(
                value: &$crate::materialize::FieldValue,
            ) -> ::core::result::Result<Self, ::std::string::String> {
                $crate::materialize::materialize_nested::<$ty>(value)
            }

            fn missing() -> Self {
                <$ty as ::core::default::Default>::default()
            }
        }
    };
}

/// Implement [`Materialize`](crate::materialize::Materialize) for a type
/// built positionally by a constructor function.
///
/// Parameter names are matched against source field names; a parameter with
/// no matching field receives its type's missing value.
///
/// ```
/// use ingestguard::materialize_constructor;
///
/// #[derive(Debug)]
/// struct Point {
///     x: f64,
///     y: f64,
/// }
///
/// impl Point {
///     fn new(x: f64, y: f64) -> Self {
///         Self { x, y }
///     }
/// }
///
/// materialize_constructor!(Point => Point::new(x: f64, y: f64));
/// ```
#[macro_export]
macro_rules! materialize_constructor {
    ($ty:ty => $($ctor:ident)::+ ( $($param:ident : $pty:ty),* $(,)? )) => {
        impl $crate::materialize::Materialize for $ty {
            fn shape() -> $crate::materialize::Shape<Self> {
                $crate::materialize::Shape::Constructor($crate::materialize::ConstructorShape {
                    params: vec![
                        $(
                            $crate::materialize::Slot {
                                name: stringify!($param),
                                type_name: ::core::any::type_name::<$pty>(),
                            }
                        ),*
                    ],
                    construct: |__args| {
                        $( let $param = __args.next_arg::<$pty>()?; )*
                        ::core::result::Result::Ok($($ctor)::+($($param),*))
                    },
                })
            }
        }

        impl $crate::materialize::FromField for $ty {
            fn from_field(
                value: &$crate::materialize::FieldValue,
            ) -> ::core::result::Result<Self, ::std::string::String> {
                $crate::materialize::materialize_nested::<$ty>(value)
            }

            fn missing() -> Self {
                $($ctor)::+($(<$pty as $crate::materialize::FromField>::missing()),*)
            }
        }
    };
}
