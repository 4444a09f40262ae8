use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use envbind::config::{collect_fields, BoxError, Code, Setter};
use envbind::{Config, ConfigError, Configurable, Environment};

#[derive(Debug, Default, Configurable)]
struct Common {
    #[config(default = "false")]
    debug: bool,
    region: String,
}

#[derive(Debug, Default, Configurable)]
struct Tls {
    cert: String,
    #[config(env = "TLS_KEY_FILE")]
    key: String,
}

#[derive(Debug, Default, Configurable)]
struct Server {
    #[config(flatten)]
    common: Common,
    #[config(default = 8080)]
    port: u16,
    #[config(nested)]
    tls: Tls,
    #[config(nested)]
    admin: Option<Tls>,
    #[config(ignored)]
    cache: HashMap<String, String>,
    r#type: String,
}

fn keys(target: &mut dyn Configurable, prefix: &str) -> Vec<String> {
    collect_fields(prefix, target)
        .unwrap()
        .iter()
        .map(|field| field.key().to_string())
        .collect()
}

#[test]
fn test_collection_order_and_keys() {
    let mut server = Server::default();
    assert_eq!(
        keys(&mut server, ""),
        vec!["DEBUG", "REGION", "PORT", "TLS_CERT", "TLS_KEY_FILE", "ADMIN_CERT", "TLS_KEY_FILE", "TYPE"]
    );
}

#[test]
fn test_prefix_reaches_nested_and_embedded_fields() {
    let mut server = Server::default();
    assert_eq!(
        keys(&mut server, "svc"),
        vec![
            "SVC_DEBUG",
            "SVC_REGION",
            "SVC_PORT",
            "SVC_TLS_CERT",
            "TLS_KEY_FILE",
            "SVC_ADMIN_CERT",
            "TLS_KEY_FILE",
            "SVC_TYPE"
        ]
    );
}

#[test]
fn test_repeated_env_override_is_a_duplicate_key() {
    let mut server = Server::default();
    let err = Config::builder("server", &mut server).with_prefix("").build().unwrap_err();
    assert!(matches!(err, ConfigError::DuplicateKey { ref key, .. } if key == "TLS_KEY_FILE"));
}

#[derive(Debug, Default, PartialEq)]
struct Hex(Vec<u8>);

impl FromStr for Hex {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        (0..s.len())
            .step_by(2)
            .map(|i| {
                s.get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| format!("invalid hex at {i}"))
            })
            .collect::<Result<_, _>>()
            .map(Hex)
    }
}

#[derive(Debug, Default, PartialEq)]
struct Tally(Vec<String>);

impl Setter for Tally {
    fn set(&mut self, raw: &str) -> Result<(), BoxError> {
        self.0.extend(raw.split('+').map(str::to_string));
        Ok(())
    }
}

// Both capabilities available; the setter is used.
impl FromStr for Tally {
    type Err = std::convert::Infallible;

    fn from_str(_: &str) -> Result<Self, Self::Err> {
        Ok(Tally(vec!["from_str".into()]))
    }
}

#[derive(Debug, Default, PartialEq)]
struct Magic(u32);

impl TryFrom<&[u8]> for Magic {
    type Error = String;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        <[u8; 4]>::try_from(bytes)
            .map(|b| Magic(u32::from_be_bytes(b)))
            .map_err(|_| format!("expected 4 bytes, got {}", bytes.len()))
    }
}

#[derive(Debug, Default, Configurable)]
struct Kinds {
    names: Vec<String>,
    empty: Vec<String>,
    raw: Vec<u8>,
    limits: HashMap<String, i64>,
    timeout: Duration,
    codes: Vec<Code>,
    ratio: f32,
    mask: u16,
    maybe: Option<i8>,
    unset: Option<i8>,
    #[config(from_str)]
    hex: Hex,
    #[config(setter, from_str)]
    tally: Tally,
    #[config(from_bytes)]
    magic: Magic,
}

fn load(kinds: &mut Kinds, env: Environment) -> Result<(), ConfigError> {
    let mut config = Config::builder("kinds", kinds)
        .with_prefix("")
        .with_environment(env)
        .with_platform(false)
        .build()?;
    config.load()
}

#[test]
fn test_kind_dispatch() {
    let mut kinds = Kinds::default();
    load(
        &mut kinds,
        Environment::new()
            .with("NAMES", "a,b,c")
            .with("EMPTY", "")
            .with("RAW", "a,b:c")
            .with("LIMITS", "a:1,b:-2")
            .with("TIMEOUT", "1m30s")
            .with("CODES", "not_found,UNAVAILABLE")
            .with("RATIO", "0.25")
            .with("MASK", "0x1F")
            .with("MAYBE", "-7")
            .with("HEX", "cafe")
            .with("TALLY", "x+y")
            .with("MAGIC", "PNG!"),
    )
    .unwrap();

    assert_eq!(kinds.names, vec!["a", "b", "c"]);
    assert!(kinds.empty.is_empty());
    assert_eq!(kinds.raw, b"a,b:c".to_vec());
    assert_eq!(kinds.limits, HashMap::from([("a".to_string(), 1), ("b".to_string(), -2)]));
    assert_eq!(kinds.timeout, Duration::from_secs(90));
    assert_eq!(kinds.codes, vec![Code::NotFound, Code::Unavailable]);
    assert_eq!(kinds.ratio, 0.25);
    assert_eq!(kinds.mask, 31);
    assert_eq!(kinds.maybe, Some(-7));
    assert_eq!(kinds.unset, None);
    assert_eq!(kinds.hex, Hex(vec![0xca, 0xfe]));
    assert_eq!(kinds.tally, Tally(vec!["x".into(), "y".into()]));
    assert_eq!(kinds.magic, Magic(u32::from_be_bytes(*b"PNG!")));
}

#[test]
fn test_malformed_map_pair_fails() {
    let mut kinds = Kinds::default();
    let err = load(&mut kinds, Environment::new().with("LIMITS", "a:1,b")).unwrap_err();
    let ConfigError::Parse(parse) = err else {
        panic!("expected a parse error");
    };
    assert_eq!(parse.key, "LIMITS");
    assert_eq!(parse.field, "limits");
    assert_eq!(parse.type_name, "HashMap<String, i64>");
    assert_eq!(parse.value, "a:1,b");
}

#[test]
fn test_capability_errors_are_parse_errors() {
    let mut kinds = Kinds::default();
    let err = load(&mut kinds, Environment::new().with("MAGIC", "GIF89a")).unwrap_err();
    assert_eq!(
        err.to_string(),
        "config parse error: assigning MAGIC to magic: converting 'GIF89a' to type Magic: \
         expected 4 bytes, got 6"
    );
}

#[test]
fn test_usage_type_names() {
    let mut kinds = Kinds::default();
    let config = Config::builder("kinds", &mut kinds).with_prefix("").build().unwrap();
    let types: HashMap<_, _> = config.groups()[0]
        .fields()
        .iter()
        .map(|field| (field.key().to_string(), field.type_name().to_string()))
        .collect();
    assert_eq!(types["NAMES"], "Vec<String>");
    assert_eq!(types["TIMEOUT"], "Duration");
    assert_eq!(types["CODES"], "Vec<Code>");
    assert_eq!(types["HEX"], "Hex");
    assert_eq!(types["MAYBE"], "Option<i8>");
}
