// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! YAML patch engine.
//!
//! A patch document mirrors the effective config shape; list elements and
//! map sections may carry a mode tag controlling how they land:
//!
//! - `!!override`, `!!override.front`, `!!override.back` — replace the
//!   matching named element (and reorder for the front/back flavors)
//! - `!!new`, `!!new.front`, `!!new.back` — append only if absent
//! - `!!new.never` — override if present, otherwise do nothing
//! - `!!skip` — leave the existing element as-is
//! - `!!delete` — remove the matching element
//! - `!!merge` — recursive union (sequences union by scalar equality)
//!
//! Modes combine with `+` (e.g. `new+override`). An untagged element
//! defaults to a field-wise override of the matching element; an untagged
//! element with no match is fatal. Both `!tag` and `!!tag` spellings are
//! accepted.

use serde_yaml::{Mapping, Value};

use crate::error::ConfigError;

/// Names the patch file currently being applied, for error reporting.
#[derive(Debug, Clone)]
pub struct PatchCtx {
    pub file: String,
}

impl PatchCtx {
    pub fn new(file: impl Into<String>) -> Self {
        Self { file: file.into() }
    }
}

const EXPLICIT: u16 = 1 << 0;
const OVERRIDE: u16 = 1 << 1;
const OVERRIDE_FRONT: u16 = 1 << 2;
const OVERRIDE_BACK: u16 = 1 << 3;
const NEW_FRONT: u16 = 1 << 4;
const NEW_BACK: u16 = 1 << 5;
const NEW_NEVER: u16 = 1 << 6;
const SKIP: u16 = 1 << 7;
const DELETE: u16 = 1 << 8;
const MERGE: u16 = 1 << 9;

const NEW_FAMILY: u16 = NEW_FRONT | NEW_BACK | NEW_NEVER;
const OVERRIDE_FAMILY: u16 = OVERRIDE | OVERRIDE_FRONT | OVERRIDE_BACK;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
struct ModeSet(u16);

impl ModeSet {
    fn has(self, bits: u16) -> bool {
        self.0 & bits != 0
    }

    fn add(&mut self, bits: u16) {
        self.0 |= bits;
    }
}

/// The custom mode tag of a node, normalized: leading `!`s and the YAML core
/// schema prefix are stripped.
fn extract_custom_tag(node: &Value) -> Option<String> {
    let Value::Tagged(tagged) = node else {
        return None;
    };
    let raw = tagged.tag.to_string();
    let raw = raw.trim_start_matches('!');
    let raw = raw.strip_prefix("tag:yaml.org,2002:").unwrap_or(raw);
    if raw.is_empty() {
        None
    } else {
        Some(raw.to_owned())
    }
}

/// The payload of a node, looking through a mode tag.
fn untag(node: &Value) -> &Value {
    match node {
        Value::Tagged(tagged) => &tagged.value,
        other => other,
    }
}

/// Remove every tag in the tree. Mode tags are patch directives, not data;
/// they must not survive into the dumped or typed configuration.
pub(crate) fn strip_tags(node: &mut Value) {
    match node {
        Value::Tagged(tagged) => {
            let mut inner = std::mem::take(&mut tagged.value);
            strip_tags(&mut inner);
            *node = inner;
        }
        Value::Sequence(items) => {
            for item in items {
                strip_tags(item);
            }
        }
        Value::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                strip_tags(item);
            }
        }
        _ => {}
    }
}

fn untagged_clone(node: &Value) -> Value {
    let mut cloned = node.clone();
    strip_tags(&mut cloned);
    cloned
}

fn analyze_patch_mode(node: &Value, ctx: &PatchCtx) -> Result<ModeSet, ConfigError> {
    let Some(tag) = extract_custom_tag(node) else {
        return Ok(ModeSet(OVERRIDE));
    };

    let mut modes = ModeSet::default();

    let check_family = |modes: ModeSet, family: u16, word: &str| -> Result<(), ConfigError> {
        if modes.has(family) {
            return Err(ConfigError::DuplicateMode {
                mode: word.to_owned(),
                file: ctx.file.clone(),
            });
        }
        Ok(())
    };

    for word in tag.split('+').map(str::trim).filter(|w| !w.is_empty()) {
        if word == "delete" {
            check_family(modes, DELETE, word)?;
            modes.add(DELETE);
        } else if word == "skip" {
            check_family(modes, SKIP, word)?;
            modes.add(SKIP);
        } else if word == "merge" {
            check_family(modes, MERGE, word)?;
            modes.add(MERGE);
        } else if let Some(option) = word.strip_prefix("new") {
            check_family(modes, NEW_FAMILY, word)?;
            match option {
                "" | ".front" => modes.add(NEW_FRONT),
                ".back" => modes.add(NEW_BACK),
                ".never" => modes.add(NEW_NEVER),
                _ => {
                    return Err(ConfigError::UnsupportedMode {
                        mode: word.to_owned(),
                        file: ctx.file.clone(),
                    })
                }
            }
        } else if let Some(option) = word.strip_prefix("override") {
            check_family(modes, OVERRIDE_FAMILY, word)?;
            match option {
                "" => modes.add(OVERRIDE),
                ".front" => modes.add(OVERRIDE_FRONT),
                ".back" => modes.add(OVERRIDE_BACK),
                _ => {
                    return Err(ConfigError::UnsupportedMode {
                        mode: word.to_owned(),
                        file: ctx.file.clone(),
                    })
                }
            }
        } else {
            return Err(ConfigError::UnsupportedMode {
                mode: word.to_owned(),
                file: ctx.file.clone(),
            });
        }
    }

    // new.never alone means: override when present, otherwise leave absent.
    if modes == ModeSet(NEW_NEVER) {
        modes.add(OVERRIDE);
    }

    let exclusive = [DELETE, OVERRIDE, SKIP]
        .iter()
        .filter(|&&bit| modes.has(bit))
        .count();
    if exclusive > 1 {
        return Err(ConfigError::ConflictingModes {
            file: ctx.file.clone(),
        });
    }

    modes.add(EXPLICIT);
    Ok(modes)
}

/// A section-level tag may only be a plain `override` (whole-section
/// replacement); anything else at that position is unsupported.
fn has_explicit_override(node: &Value, ctx: &PatchCtx) -> Result<bool, ConfigError> {
    match extract_custom_tag(node) {
        None => Ok(false),
        Some(tag) if tag == "override" => Ok(true),
        Some(tag) => Err(ConfigError::UnsupportedMode {
            mode: tag,
            file: ctx.file.clone(),
        }),
    }
}

/// Recursive map merge: scalars and type mismatches replace, maps recurse,
/// missing keys insert.
fn merge_map_node(res: &mut Value, ext: &Value) {
    let ext = untag(ext);
    if ext.is_null() {
        return;
    }

    let replace = !(ext.is_mapping() && res.is_mapping());
    if replace {
        *res = untagged_clone(ext);
        return;
    }

    let (Some(res_map), Some(ext_map)) = (res.as_mapping_mut(), ext.as_mapping()) else {
        return;
    };
    for (key, ext_item) in ext_map {
        match res_map.get_mut(key) {
            Some(slot) => merge_map_node(slot, ext_item),
            None => {
                res_map.insert(key.clone(), untagged_clone(ext_item));
            }
        }
    }
}

fn merge_map_node_checked(res: &mut Value, ext: &Value, ctx: &PatchCtx) -> Result<(), ConfigError> {
    if has_explicit_override(ext, ctx)? {
        *res = untagged_clone(untag(ext));
        return Ok(());
    }
    merge_map_node(res, ext);
    Ok(())
}

/// `!!merge` semantics: maps union recursively, sequences union by scalar
/// equality, anything else replaces.
fn compare_and_replace(res: &mut Value, ext: &Value) {
    let ext = untag(ext);
    if ext.is_mapping() && res.is_mapping() {
        merge_map_node(res, ext);
        return;
    }

    if let (Some(res_seq), Some(ext_seq)) = (res.as_sequence(), ext.as_sequence()) {
        let mut merged = res_seq.clone();
        for item in ext_seq {
            let item = untagged_clone(item);
            if !merged.contains(&item) {
                merged.push(item);
            }
        }
        *res = Value::Sequence(merged);
        return;
    }

    *res = untagged_clone(ext);
}

fn element_key(node: &Value, id_key: &str, ctx: &PatchCtx) -> Result<String, ConfigError> {
    let node = untag(node);
    let keyed = if id_key.is_empty() {
        Some(node)
    } else {
        node.get(id_key)
    };

    match keyed.map(untag) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ConfigError::Structure {
            reason: if id_key.is_empty() {
                "expected a scalar list element".to_owned()
            } else {
                format!("list element is missing its [{id_key}] key")
            },
            file: ctx.file.clone(),
        }),
    }
}

type ItemHandler<'h> = &'h dyn Fn(&mut Value, &Value, &PatchCtx) -> Result<(), ConfigError>;

/// Patch an ordered list, matching elements by `id_key` (empty = scalar
/// identity). First match wins; unmatched untagged elements are fatal.
fn patch_list_node(
    res: &mut Value,
    ext: Option<&Value>,
    id_key: &str,
    ctx: &PatchCtx,
    handler: ItemHandler<'_>,
) -> Result<(), ConfigError> {
    let Some(ext) = ext else {
        return Ok(());
    };
    if untag(ext).is_null() {
        return Ok(());
    }

    if has_explicit_override(ext, ctx)? {
        *res = untagged_clone(untag(ext));
        return Ok(());
    }

    let ext_inner = untag(ext);
    let res_is_populated_list = res
        .as_sequence()
        .map(|seq| !seq.is_empty())
        .unwrap_or(false);
    if !res_is_populated_list || !ext_inner.is_sequence() {
        // nothing to match against: the incoming list becomes the list
        *res = untagged_clone(ext_inner);
        return Ok(());
    }

    let Some(ext_seq) = ext_inner.as_sequence() else {
        return Ok(());
    };

    for ext_item in ext_seq {
        let modes = analyze_patch_mode(ext_item, ctx)?;
        let name = element_key(ext_item, id_key, ctx)?;

        let res_idx = {
            let Some(res_seq) = res.as_sequence() else {
                return Ok(());
            };
            let mut found = None;
            for (idx, item) in res_seq.iter().enumerate() {
                if element_key(item, id_key, ctx)? == name {
                    found = Some(idx);
                    break;
                }
            }
            found
        };

        let Some(res_seq) = res.as_sequence_mut() else {
            return Ok(());
        };

        let Some(idx) = res_idx else {
            if modes.has(NEW_FRONT) {
                res_seq.insert(0, untagged_clone(ext_item));
            } else if modes.has(NEW_BACK) {
                res_seq.push(untagged_clone(ext_item));
            } else if modes.has(NEW_NEVER) {
                // absent stays absent
            } else {
                return Err(ConfigError::PatchTargetMissing {
                    name,
                    file: ctx.file.clone(),
                });
            }
            continue;
        };

        let apply_override =
            |slot: &mut Value, ctx: &PatchCtx| -> Result<(), ConfigError> {
                if modes.has(EXPLICIT) && modes.has(OVERRIDE_FAMILY) {
                    *slot = untagged_clone(untag(ext_item));
                    Ok(())
                } else {
                    handler(slot, ext_item, ctx)
                }
            };

        if modes.has(OVERRIDE) {
            apply_override(&mut res_seq[idx], ctx)?;
        } else if modes.has(OVERRIDE_FRONT) {
            apply_override(&mut res_seq[idx], ctx)?;
            let item = res_seq.remove(idx);
            res_seq.insert(0, item);
        } else if modes.has(OVERRIDE_BACK) {
            apply_override(&mut res_seq[idx], ctx)?;
            let item = res_seq.remove(idx);
            res_seq.push(item);
        } else if modes.has(SKIP) {
            // leave as-is
        } else if modes.has(DELETE) {
            res_seq.remove(idx);
        } else if modes.has(MERGE) {
            compare_and_replace(&mut res_seq[idx], ext_item);
        } else {
            return Err(ConfigError::AmbiguousExisting {
                name,
                file: ctx.file.clone(),
            });
        }
    }

    Ok(())
}

/// Merge a map element whose named sub-keys are themselves patchable lists.
fn patch_map_with_sublists(
    res: &mut Value,
    ext: &Value,
    sublists: &[(&str, &str)],
    ctx: &PatchCtx,
) -> Result<(), ConfigError> {
    let ext = untag(ext);
    if ext.is_null() {
        return Ok(());
    }
    if !(ext.is_mapping() && res.is_mapping()) {
        *res = untagged_clone(ext);
        return Ok(());
    }

    let Some(ext_map) = ext.as_mapping() else {
        return Ok(());
    };
    for (key, ext_item) in ext_map {
        let key_str = key.as_str().unwrap_or_default();
        let sublist = sublists.iter().find(|(name, _)| *name == key_str);

        let Some(res_map) = res.as_mapping_mut() else {
            return Ok(());
        };
        let slot = res_map
            .entry(key.clone())
            .or_insert(Value::Null);

        match sublist {
            Some((_, id_key)) => patch_list_node(slot, Some(ext_item), id_key, ctx, &default_handler)?,
            None => merge_map_node(slot, ext_item),
        }
    }
    Ok(())
}

fn default_handler(res: &mut Value, ext: &Value, _ctx: &PatchCtx) -> Result<(), ConfigError> {
    merge_map_node(res, ext);
    Ok(())
}

fn section_slot<'a>(res: &'a mut Value, key: &str) -> &'a mut Value {
    if !res.is_mapping() {
        *res = Value::Mapping(Mapping::new());
    }
    #[allow(clippy::unwrap_used)] // just ensured res is a mapping
    res.as_mapping_mut()
        .unwrap()
        .entry(Value::String(key.to_owned()))
        .or_insert(Value::Null)
}

fn topic_options_handler(res: &mut Value, ext: &Value, ctx: &PatchCtx) -> Result<(), ConfigError> {
    patch_map_with_sublists(
        res,
        ext,
        &[("enable_backends", ""), ("enable_filters", "")],
        ctx,
    )
}

fn channel_backend_handler(res: &mut Value, ext: &Value, ctx: &PatchCtx) -> Result<(), ConfigError> {
    patch_map_with_sublists(
        res,
        ext,
        &[
            ("pub_topics_options", "topic_name"),
            ("sub_topics_options", "topic_name"),
        ],
        ctx,
    )
}

fn rpc_backend_handler(res: &mut Value, ext: &Value, ctx: &PatchCtx) -> Result<(), ConfigError> {
    patch_map_with_sublists(
        res,
        ext,
        &[
            ("clients_options", "func_name"),
            ("servers_options", "func_name"),
        ],
        ctx,
    )
}

/// Apply one patch document onto the effective tree.
pub fn patch_root(res: &mut Value, ext: &Value, ctx: &PatchCtx) -> Result<(), ConfigError> {
    let ext = untag(ext);
    if ext.is_null() {
        return Ok(());
    }

    for section in ["configurator", "main_thread", "guard_thread"] {
        if let Some(ext_section) = ext.get(section) {
            merge_map_node_checked(section_slot(res, section), ext_section, ctx)?;
        }
    }

    if let Some(ext_log) = ext.get("log") {
        let slot = section_slot(res, "log");
        if has_explicit_override(ext_log, ctx)? {
            *slot = untagged_clone(untag(ext_log));
        } else {
            let ext_log = untag(ext_log);
            for scalar in ["core_lvl", "default_module_lvl"] {
                if let Some(value) = ext_log.get(scalar) {
                    merge_map_node(section_slot(slot, scalar), value);
                }
            }
            patch_list_node(
                section_slot(slot, "backends"),
                ext_log.get("backends"),
                "type",
                ctx,
                &default_handler,
            )?;
        }
    }

    if let Some(ext_plugin) = ext.get("plugin") {
        let slot = section_slot(res, "plugin");
        if has_explicit_override(ext_plugin, ctx)? {
            *slot = untagged_clone(untag(ext_plugin));
        } else {
            patch_list_node(
                section_slot(slot, "plugins"),
                untag(ext_plugin).get("plugins"),
                "name",
                ctx,
                &default_handler,
            )?;
        }
    }

    if let Some(ext_channel) = ext.get("channel") {
        let slot = section_slot(res, "channel");
        if has_explicit_override(ext_channel, ctx)? {
            *slot = untagged_clone(untag(ext_channel));
        } else {
            let ext_channel = untag(ext_channel);
            patch_list_node(
                section_slot(slot, "backends"),
                ext_channel.get("backends"),
                "type",
                ctx,
                &channel_backend_handler,
            )?;
            for side in ["pub_topics_options", "sub_topics_options"] {
                patch_list_node(
                    section_slot(slot, side),
                    ext_channel.get(side),
                    "topic_name",
                    ctx,
                    &topic_options_handler,
                )?;
            }
        }
    }

    if let Some(ext_rpc) = ext.get("rpc") {
        let slot = section_slot(res, "rpc");
        if has_explicit_override(ext_rpc, ctx)? {
            *slot = untagged_clone(untag(ext_rpc));
        } else {
            let ext_rpc = untag(ext_rpc);
            patch_list_node(
                section_slot(slot, "backends"),
                ext_rpc.get("backends"),
                "type",
                ctx,
                &rpc_backend_handler,
            )?;
            for side in ["clients_options", "servers_options"] {
                patch_list_node(
                    section_slot(slot, side),
                    ext_rpc.get(side),
                    "func_name",
                    ctx,
                    &topic_options_handler,
                )?;
            }
        }
    }

    if let Some(ext_executor) = ext.get("executor") {
        let slot = section_slot(res, "executor");
        if has_explicit_override(ext_executor, ctx)? {
            *slot = untagged_clone(untag(ext_executor));
        } else {
            patch_list_node(
                section_slot(slot, "executors"),
                untag(ext_executor).get("executors"),
                "name",
                ctx,
                &default_handler,
            )?;
        }
    }

    if let Some(ext_module) = ext.get("module") {
        let slot = section_slot(res, "module");
        if has_explicit_override(ext_module, ctx)? {
            *slot = untagged_clone(untag(ext_module));
        } else {
            let ext_module = untag(ext_module);
            patch_list_node(
                section_slot(slot, "pkgs"),
                ext_module.get("pkgs"),
                "path",
                ctx,
                &default_handler,
            )?;
            patch_list_node(
                section_slot(slot, "modules"),
                ext_module.get("modules"),
                "name",
                ctx,
                &default_handler,
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "patch_tests.rs"]
mod tests;
