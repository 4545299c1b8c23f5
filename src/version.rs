//! Build version, overridable at compile time through `APP_VERSION`.

const fn version_or_package(overridden: Option<&'static str>) -> &'static str {
    match overridden {
        Some(val) => val,
        None => env!("CARGO_PKG_VERSION"),
    }
}

pub const VERSION: &str = version_or_package(option_env!("APP_VERSION"));

/// `User-Agent` sent with every management API request.
pub fn user_agent() -> String {
    format!("{}/{VERSION}", env!("CARGO_PKG_NAME"))
}
