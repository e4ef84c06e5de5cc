//! Registry of handlers for override tags outside the built-in tag grammar.
//!
//! A handler turns the argument text of its tag into [`EffectParams`] and back. Handlers for
//! the common non-styling tags (`\blur`, `\bord`, `\an`, ...) are submitted through
//! `inventory` and loaded the first time the registry is used; more can be added at runtime
//! with [`register_effect`]. Tags without a handler are kept as [`Effect::Unknown`].

use std::borrow::Cow;
use std::sync::{PoisonError, RwLock};

use indexmap::IndexMap;
use once_cell::sync::Lazy;

use crate::error::Error;

use super::parse::{is_builtin_tag, parse_int, parse_number};
use super::{Effect, EffectParams, TaggedEffect};

/// Parses the argument text following the tag name. Returns `None` if the argument is not
/// valid for this tag, in which case the tag is kept as an unknown tag.
pub type ParseFn = fn(&str) -> Option<EffectParams>;

/// Writes the argument text for the given parameters; the tag name is written by the caller.
pub type SerializeFn = fn(&EffectParams) -> String;

#[derive(Debug, Clone)]
pub struct EffectHandler {
    pub tag: Cow<'static, str>,
    pub effect_type: Cow<'static, str>,
    pub parse: ParseFn,
    pub serialize: SerializeFn,
}

impl EffectHandler {
    #[must_use]
    pub const fn new(
        tag: &'static str,
        effect_type: &'static str,
        parse: ParseFn,
        serialize: SerializeFn,
    ) -> Self {
        Self {
            tag: Cow::Borrowed(tag),
            effect_type: Cow::Borrowed(effect_type),
            parse,
            serialize,
        }
    }
}

inventory::collect!(EffectHandler);

static REGISTRY: Lazy<RwLock<IndexMap<String, EffectHandler>>> = Lazy::new(|| {
    let mut handlers = IndexMap::new();
    for handler in inventory::iter::<EffectHandler> {
        handlers.insert(handler.tag.to_string(), handler.clone());
    }
    log::debug!("loaded {} built-in effect handlers", handlers.len());
    RwLock::new(handlers)
});

/// Load the built-in handlers now rather than on first use. Calling this more than once has
/// no further effect.
pub fn init() {
    Lazy::force(&REGISTRY);
}

/// Register a handler for `\<tag>`.
///
/// # Errors
/// Returns an error if `tag` is not purely alphabetic, is a tag of the built-in grammar
/// (`\b`, `\pos`, ...), or already has a handler.
pub fn register_effect<S, T>(
    tag: S,
    effect_type: T,
    parse: ParseFn,
    serialize: SerializeFn,
) -> Result<(), Error>
where
    S: Into<String>,
    T: Into<String>,
{
    let tag = tag.into();
    if tag.is_empty() || !tag.chars().all(|char| char.is_ascii_alphabetic()) {
        return Err(Error::InvalidEffectName(tag));
    }
    if is_builtin_tag(&tag) {
        return Err(Error::ReservedEffectName(tag));
    }

    let mut handlers = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    if handlers.contains_key(&tag) {
        return Err(Error::EffectAlreadyRegistered(tag));
    }

    let handler = EffectHandler {
        tag: Cow::Owned(tag.clone()),
        effect_type: Cow::Owned(effect_type.into()),
        parse,
        serialize,
    };
    log::debug!("registered effect handler for \\{tag} ({})", handler.effect_type);
    handlers.insert(tag, handler);

    Ok(())
}

#[must_use]
pub fn get_effect_handler(tag: &str) -> Option<EffectHandler> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(tag)
        .cloned()
}

/// Try to interpret `\<tag><args>` through the registry.
pub(crate) fn parse_registered(tag: &str, args: &str) -> Option<Effect> {
    let handler = get_effect_handler(tag)?;
    let params = (handler.parse)(args)?;

    Some(Effect::Tagged(TaggedEffect {
        tag: tag.to_owned(),
        effect_type: handler.effect_type.into_owned(),
        params,
    }))
}

/// The argument text for a tagged effect. Effects whose handler is not registered in this
/// process are written in the generic format.
pub(crate) fn serialize_registered(effect: &TaggedEffect) -> String {
    match get_effect_handler(&effect.tag) {
        Some(handler) => (handler.serialize)(&effect.params),
        None => plain_param(&effect.params),
    }
}

/// Arguments of tags like `\blur2.5`. An empty argument resets to the style's value.
fn number_param(args: &str) -> Option<EffectParams> {
    if args.trim().is_empty() {
        return Some(EffectParams::None);
    }
    parse_number(args).map(EffectParams::Number)
}

fn integer_param(args: &str) -> Option<EffectParams> {
    if args.trim().is_empty() {
        return Some(EffectParams::None);
    }
    parse_int(args).map(|value| EffectParams::Integer(value.into()))
}

fn alignment_param(args: &str) -> Option<EffectParams> {
    integer_param(args).filter(|params| match params {
        EffectParams::Integer(an) => (1..=9).contains(an),
        _ => true,
    })
}

/// Legacy `\a` alignment uses a different numbering than `\an` (1-3, 5-7, 9-11).
fn legacy_alignment_param(args: &str) -> Option<EffectParams> {
    integer_param(args).filter(|params| match params {
        EffectParams::Integer(a) => matches!(a, 1..=3 | 5..=7 | 9..=11),
        _ => true,
    })
}

fn wrap_style_param(args: &str) -> Option<EffectParams> {
    integer_param(args).filter(|params| match params {
        EffectParams::Integer(q) => (0..=3).contains(q),
        _ => true,
    })
}

/// Writes parameters back the way the parse functions above read them.
fn plain_param(params: &EffectParams) -> String {
    match params {
        EffectParams::None => String::new(),
        EffectParams::Integer(value) => value.to_string(),
        EffectParams::Number(value) => value.to_string(),
        EffectParams::Numbers(values) => {
            let joined: Vec<String> = values.iter().map(ToString::to_string).collect();
            format!("({})", joined.join(","))
        }
        EffectParams::Text(text) => text.clone(),
    }
}

inventory::submit! { EffectHandler::new("blur", "blur", number_param, plain_param) }
inventory::submit! { EffectHandler::new("be", "blur", number_param, plain_param) }
inventory::submit! { EffectHandler::new("bord", "border", number_param, plain_param) }
inventory::submit! { EffectHandler::new("xbord", "border", number_param, plain_param) }
inventory::submit! { EffectHandler::new("ybord", "border", number_param, plain_param) }
inventory::submit! { EffectHandler::new("shad", "shadow", number_param, plain_param) }
inventory::submit! { EffectHandler::new("xshad", "shadow", number_param, plain_param) }
inventory::submit! { EffectHandler::new("yshad", "shadow", number_param, plain_param) }
inventory::submit! { EffectHandler::new("fax", "shear", number_param, plain_param) }
inventory::submit! { EffectHandler::new("fay", "shear", number_param, plain_param) }
inventory::submit! { EffectHandler::new("an", "alignment", alignment_param, plain_param) }
inventory::submit! { EffectHandler::new("a", "alignment", legacy_alignment_param, plain_param) }
inventory::submit! { EffectHandler::new("q", "wrap-style", wrap_style_param, plain_param) }
inventory::submit! { EffectHandler::new("fe", "encoding", integer_param, plain_param) }
inventory::submit! { EffectHandler::new("kt", "karaoke-onset", number_param, plain_param) }
