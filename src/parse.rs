//! Parsing of `javap` output into [`ClassDescriptor`]s.
//!
//! The tool's output is treated as a line-oriented grammar:
//!
//! - a per-class header (`Classfile ...` for verbose output, `Compiled from
//!   "..."` for basic output) starts each class section;
//! - an unindented declaration line names the class and its superclass;
//! - inside the braces, basic output has one `;`-terminated member per line,
//!   while verbose output puts each member at indentation 2 followed by
//!   attribute blocks at indentation 4 and their contents at indentation 6.
//!
//! Parameter names only appear in verbose output, inside the
//! [`PARAMETER_TABLE_MARKER`] block of a member.

use anyhow::{Result, bail};
use std::sync::Arc;

use crate::model::{
    ClassDescriptor, MemberDescriptor, MemberKind, Origin, Recency, Visibility, simple_name,
};

pub const PARAMETER_TABLE_MARKER: &str = "MethodParameters:";

const MEMBER_INDENT: usize = 2;
const ATTRIBUTE_INDENT: usize = 4;
const ATTRIBUTE_ROW_INDENT: usize = 6;

const TYPE_KEYWORDS: [&str; 4] = ["class", "interface", "enum", "record"];

const MODIFIERS: [&str; 14] = [
    "public",
    "protected",
    "private",
    "static",
    "final",
    "abstract",
    "native",
    "synchronized",
    "transient",
    "volatile",
    "strictfp",
    "default",
    "sealed",
    "non-sealed",
];

const PARAMETER_FLAGS: [&str; 3] = ["final", "synthetic", "mandated"];

/// Printed in place of the name for parameters compiled without one.
const UNNAMED_PARAMETER: &str = "<no name>";

/// Class name and superclass taken from a declaration line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassHeader {
    pub class_name: String,
    pub superclass_name: Option<String>,
}

/// Splits one tool invocation's output into per-class chunks.
///
/// Text before the first declaration (warnings, stray headers) is dropped.
pub fn split_chunks(output: &str) -> Vec<String> {
    let normalized = output.replace("\r\n", "\n");

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut has_declaration = false;

    for line in normalized.lines() {
        let top_level = !is_indented(line);
        let is_header =
            top_level && (line.starts_with("Classfile ") || line.starts_with("Compiled from "));
        let is_declaration = top_level && parse_class_header(line).is_some();

        if is_header || (is_declaration && has_declaration) {
            if has_declaration {
                chunks.push(std::mem::take(&mut current));
            }
            current.clear();
            has_declaration = false;
        }

        has_declaration |= is_declaration;
        current.push_str(line);
        current.push('\n');
    }

    if has_declaration {
        chunks.push(current);
    }
    chunks
}

/// Recognises a class or interface declaration line such as
/// `public final class a.B<T> extends a.C<T> implements a.I {`.
pub fn parse_class_header(line: &str) -> Option<ClassHeader> {
    if is_indented(line) {
        return None;
    }
    let tokens = split_top_level(line.trim().trim_end_matches('{'), char::is_whitespace);
    let keyword_at = tokens.iter().position(|t| TYPE_KEYWORDS.contains(t))?;
    if !tokens[..keyword_at].iter().all(|t| MODIFIERS.contains(t)) {
        return None;
    }

    let class_name = strip_generics(tokens.get(keyword_at + 1)?);
    if class_name.is_empty() {
        return None;
    }

    let superclass_name = if tokens[keyword_at] == "interface" {
        None
    } else {
        tokens[keyword_at + 2..]
            .windows(2)
            .find(|pair| pair[0] == "extends")
            .map(|pair| strip_generics(pair[1]).to_string())
    };

    Some(ClassHeader {
        class_name: class_name.to_string(),
        superclass_name,
    })
}

/// Parses a chunk of basic (`javap -classpath ...`) output. Members carry no
/// parameter names.
pub fn parse_basic(chunk: &str, origin: Origin) -> Option<ClassDescriptor> {
    let mut header = None;
    let mut in_body = false;
    let mut prototypes = Vec::new();

    for line in chunk.lines() {
        if !in_body {
            if !is_indented(line) {
                if header.is_none() {
                    header = parse_class_header(line);
                }
                in_body = header.is_some() && line.contains('{');
            }
            continue;
        }

        let trimmed = line.trim();
        if trimmed == "}" {
            break;
        }
        if trimmed.ends_with(';') {
            prototypes.push(PendingMember::new(trimmed));
        }
    }

    build_descriptor(header?, origin, prototypes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Header,
    Members,
    End,
}

#[derive(Debug)]
struct PendingMember {
    prototype: String,
    parameter_names: Vec<String>,
    collecting: bool,
}

impl PendingMember {
    fn new(prototype: &str) -> Self {
        Self {
            prototype: prototype.to_string(),
            parameter_names: Vec::new(),
            collecting: false,
        }
    }
}

/// Parses a chunk of verbose (`javap -private -v`) output, recovering
/// parameter names from each member's parameter table.
pub fn parse_verbose(chunk: &str, origin: Origin) -> Option<ClassDescriptor> {
    let mut section = Section::Header;
    let mut header = None;
    let mut pending: Vec<PendingMember> = Vec::new();

    for line in chunk.lines() {
        let line = line.trim_end();
        match section {
            Section::Header => {
                if is_indented(line) {
                    continue;
                }
                if header.is_none() {
                    header = parse_class_header(line);
                }
                if header.is_some() && line.contains('{') {
                    section = Section::Members;
                }
            }
            Section::Members => {
                if line == "}" {
                    section = Section::End;
                    continue;
                }
                match indentation(line) {
                    MEMBER_INDENT => pending.push(PendingMember::new(line.trim())),
                    ATTRIBUTE_INDENT => {
                        if let Some(member) = pending.last_mut() {
                            member.collecting = line.trim() == PARAMETER_TABLE_MARKER;
                        }
                    }
                    ATTRIBUTE_ROW_INDENT => {
                        if let Some(member) = pending.last_mut()
                            && member.collecting
                            && let Some(name) = parameter_name(line)
                        {
                            member.parameter_names.push(name.to_string());
                        }
                    }
                    _ => {}
                }
            }
            Section::End => break,
        }
    }

    build_descriptor(header?, origin, pending)
}

fn build_descriptor(
    header: ClassHeader,
    origin: Origin,
    pending: Vec<PendingMember>,
) -> Option<ClassDescriptor> {
    let mut class = ClassDescriptor::new(&header.class_name, origin);
    class.superclass_name = header.superclass_name;
    class.members_loaded = true;

    for member in pending {
        match parse_member(&member.prototype, &class, &member.parameter_names) {
            Ok(parsed) if parsed.kind == MemberKind::Constructor => {
                class.constructors.push(Arc::new(parsed))
            }
            Ok(parsed) => class.members.push(Arc::new(parsed)),
            Err(err) => tracing::debug!(
                "Skipping member of {}: {err}: {}",
                class.class_name,
                member.prototype
            ),
        }
    }

    Some(class)
}

/// Turns one declaration line into a member of `class`.
pub fn parse_member(
    prototype: &str,
    class: &ClassDescriptor,
    parameter_names: &[String],
) -> Result<MemberDescriptor> {
    let text = prototype.trim().trim_end_matches(';').trim_end();
    if text.is_empty() {
        bail!("empty declaration");
    }
    if text.contains('{') {
        bail!("initializer block");
    }

    let (head, params) = match text.find('(') {
        Some(open) => {
            let Some(close) = text.rfind(')').filter(|close| *close > open) else {
                bail!("unbalanced parameter list");
            };
            (&text[..open], Some(&text[open + 1..close]))
        }
        None => (text, None),
    };

    let tokens = split_top_level(head, char::is_whitespace);
    let Some((name_token, before)) = tokens.split_last() else {
        bail!("missing member name");
    };
    if name_token.contains(['<', '>', '=']) {
        bail!("malformed member name `{name_token}`");
    }

    let visibility = before
        .first()
        .map(|t| Visibility::from_modifier(t))
        .unwrap_or(Visibility::Package);
    let parameter_types = params.map(|p| {
        split_top_level(p, |c| c == ',')
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
    });

    let is_constructor = params.is_some() && simple_name(name_token) == class.simple_name;
    let (kind, name, return_type) = if is_constructor {
        (
            MemberKind::Constructor,
            class.simple_name.clone(),
            class.class_name.clone(),
        )
    } else {
        let Some(return_type) = before.last().filter(|t| !MODIFIERS.contains(*t)) else {
            bail!("missing return type");
        };
        let kind = if params.is_some() {
            MemberKind::Method
        } else {
            MemberKind::Property
        };
        (kind, name_token.to_string(), return_type.to_string())
    };

    let signature = if params.is_some() && !parameter_names.is_empty() {
        interleave_parameter_names(text, parameter_names)
    } else {
        text.to_string()
    };

    Ok(MemberDescriptor {
        kind,
        name,
        class_name: class.class_name.clone(),
        simple_class_name: class.simple_name.clone(),
        return_type,
        visibility,
        parameter_types,
        signature,
        last_used: Recency::new(class.origin.seed_rank()),
    })
}

/// Rewrites `f(int, java.util.Map<K, V>)` with names `[a, b]` as
/// `f(int a, java.util.Map<K, V> b)`. Types beyond the supplied names are
/// left bare, as are types whose name is empty; a prototype without a
/// parameter list is returned unchanged.
pub fn interleave_parameter_names(prototype: &str, names: &[String]) -> String {
    let (Some(open), Some(close)) = (prototype.find('('), prototype.rfind(')')) else {
        return prototype.to_string();
    };
    if close < open {
        return prototype.to_string();
    }

    let params = split_top_level(&prototype[open + 1..close], |c| c == ',')
        .into_iter()
        .enumerate()
        .map(|(i, ty)| match names.get(i) {
            Some(name) if !name.is_empty() => format!("{ty} {name}"),
            _ => ty.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ");

    format!("{}({params}){}", &prototype[..open], &prototype[close + 1..])
}

/// Splits on `is_sep` outside of `<...>` regions, trimming pieces and
/// dropping empty ones.
pub fn split_top_level(text: &str, is_sep: impl Fn(char) -> bool) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (i, ch) in text.char_indices() {
        match ch {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            c if depth == 0 && is_sep(c) => {
                pieces.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    pieces.push(&text[start..]);

    pieces
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

fn strip_generics(token: &str) -> &str {
    token.split('<').next().unwrap_or(token).trim()
}

fn is_indented(line: &str) -> bool {
    line.starts_with(char::is_whitespace)
}

fn indentation(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

/// A parameter table row: the name, optionally followed by access flags.
/// An unnamed parameter yields an empty name so later rows keep their
/// position.
fn parameter_name(line: &str) -> Option<&str> {
    let row = line.trim();
    let (name, flags) = match row.strip_prefix(UNNAMED_PARAMETER) {
        Some(flags) => ("", flags),
        None => {
            let (name, flags) = row.split_once(char::is_whitespace).unwrap_or((row, ""));
            let is_identifier = !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '$');
            if !is_identifier {
                return None;
            }
            (name, flags)
        }
    };
    flags
        .split_whitespace()
        .all(|t| PARAMETER_FLAGS.contains(&t))
        .then_some(name)
}
