/// Declares a unit-only settings enum with snake_case serde names, `Display`,
/// `FromStr` (accepting a list of aliases per variant) and `as_str`.
///
/// ```ignore
/// settings_enum! {
///     /// Docs.
///     pub enum Mode {
///         /// First variant (default).
///         #[default]
///         Fast => "fast" | "quick",
///         Slow => "slow",
///     }
/// }
/// ```
macro_rules! settings_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident => $label:literal $(| $alias:literal)*
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Default,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $(
                $(#[$vmeta])*
                $variant,
            )+
        }

        impl $name {
            /// Canonical lowercase label used in settings files and CLI flags.
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
                match normalized.as_str() {
                    $($label $(| $alias)* => Ok($name::$variant),)+
                    other => Err(format!(
                        concat!("invalid ", stringify!($name), " '{}'; expected one of: {}"),
                        other,
                        [$($label),+].join(", ")
                    )),
                }
            }
        }
    };
}

pub(crate) use settings_enum;
