//! Target framework moniker resolution.

/// Property naming the short moniker of an inner build (`net8.0`).
pub const TARGET_FRAMEWORK: &str = "TargetFramework";
/// Property naming the framework family (`.NETCoreApp`).
pub const TARGET_FRAMEWORK_IDENTIFIER: &str = "TargetFrameworkIdentifier";
/// Property naming the framework version (`v8.0`).
pub const TARGET_FRAMEWORK_VERSION: &str = "TargetFrameworkVersion";
/// Property holding the long moniker (`.NETCoreApp,Version=v8.0`).
pub const TARGET_FRAMEWORK_MONIKER: &str = "TargetFrameworkMoniker";
/// Property listing every framework of a multi-targeting outer build.
pub const TARGET_FRAMEWORKS: &str = "TargetFrameworks";

/// Identifier (without leading dot), short prefix, whether version dots are kept.
const MONIKER_PREFIXES: &[(&str, &str, bool)] = &[
    ("NETCoreApp", "netcoreapp", true),
    ("NETStandard", "netstandard", true),
    ("NETFramework", "net", false),
    ("NETCore", "netcore", false),
    ("NETMicroFramework", "netmf", false),
    ("Silverlight", "sl", false),
    ("WindowsPhone", "wp", false),
    ("WindowsPhoneApp", "wpa", false),
    ("MonoAndroid", "monoandroid", false),
    ("Xamarin.iOS", "xamarinios", false),
    ("Xamarin.Mac", "xamarinmac", false),
];

/// Resolves a short moniker from whatever framework properties are present.
///
/// Precedence: an explicit `TargetFramework`, then identifier + version, then
/// the long `TargetFrameworkMoniker` form.
pub fn resolve<'a>(lookup: impl Fn(&str) -> Option<&'a str>) -> Option<String> {
    if let Some(explicit) = non_blank(lookup(TARGET_FRAMEWORK)) {
        return Some(explicit.to_string());
    }
    if let (Some(identifier), Some(version)) = (
        non_blank(lookup(TARGET_FRAMEWORK_IDENTIFIER)),
        non_blank(lookup(TARGET_FRAMEWORK_VERSION)),
    ) {
        if let Some(moniker) = from_identifier_and_version(identifier, version) {
            return Some(moniker);
        }
    }
    let (identifier, version) = parse_long_moniker(non_blank(lookup(TARGET_FRAMEWORK_MONIKER))?)?;
    from_identifier_and_version(identifier, version)
}

/// Maps `(.NETCoreApp, v8.0)` style pairs to a short moniker (`net8.0`).
pub fn from_identifier_and_version(identifier: &str, version: &str) -> Option<String> {
    let identifier = identifier.trim().trim_start_matches('.');
    let version = version.trim().trim_start_matches(['v', 'V']);
    if version.is_empty() {
        return None;
    }

    let &(name, prefix, keep_dots) = MONIKER_PREFIXES
        .iter()
        .find(|(name, _, _)| name.eq_ignore_ascii_case(identifier))?;

    // .NET 5 and later dropped the "coreapp" suffix
    if name == "NETCoreApp" && major_version(version).is_some_and(|major| major >= 5) {
        return Some(format!("net{version}"));
    }

    if keep_dots {
        Some(format!("{prefix}{version}"))
    } else {
        Some(format!("{prefix}{}", version.replace('.', "")))
    }
}

/// Splits `.NETCoreApp,Version=v8.0` into identifier and version.
pub fn parse_long_moniker(moniker: &str) -> Option<(&str, &str)> {
    let mut parts = moniker.split(',');
    let identifier = parts.next()?.trim();
    let version = parts.find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("Version")
            .then_some(value.trim())
    })?;
    Some((identifier, version))
}

fn major_version(version: &str) -> Option<u32> {
    version.split('.').next()?.parse().ok()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
