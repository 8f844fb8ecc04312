use std::fmt::Write;

use quick_xml::escape::escape;

use crate::bulk::{Group, GroupElement};
use crate::record::{FieldAccess, RecordView};
use crate::schema::{FieldSpec, FieldType};
use crate::value::FieldValue;

/// Renders a record as an XML element named after its event, with one
/// attribute per scalar field and one child per repeated group. Groups
/// nested in group elements become children of their element.
pub fn to_xml(view: &RecordView) -> String {
    let kind = view.kind();
    let mut out = String::new();
    let _ = write!(
        out,
        "<Event Name=\"{}/{}\" Version=\"{}\"",
        escape(kind.task_name),
        escape(kind.event_name),
        view.version()
    );
    let mut groups = Vec::new();
    let version = view.version();
    for field in kind.fields.iter().filter(|f| f.present_in(version)) {
        if let FieldType::Array(_) = field.ty {
            groups.push(field.name);
            continue;
        }
        if let Some(value) = view.value(field.name) {
            attribute(&mut out, field, &value);
        }
    }
    if groups.is_empty() {
        out.push_str("/>");
        return out;
    }
    out.push('>');
    for name in groups {
        if let Some(group) = view.group(name) {
            render_group(&mut out, name, &group);
        }
    }
    out.push_str("</Event>");
    out
}

fn render_group(out: &mut String, name: &str, group: &Group) {
    let _ = write!(out, "<{} Count=\"{}\">", name, group.len());
    for element in group.iter() {
        render_element(out, &element);
    }
    let _ = write!(out, "</{}>", name);
}

fn render_element(out: &mut String, element: &GroupElement) {
    out.push_str("<Element");
    if let Some(value) = element.scalar() {
        let _ = write!(out, " Value=\"{}\"", escape(value.to_string().as_str()));
        out.push_str("/>");
        return;
    }
    let mut groups = Vec::new();
    for name in element.field_names() {
        let Some((field, _)) = element.locate(name) else {
            continue;
        };
        if let FieldType::Array(_) = field.ty {
            groups.push(name);
        } else if let Some(value) = element.value(name) {
            attribute(out, field, &value);
        }
    }
    if groups.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for name in groups {
        if let Some(group) = element.group(name) {
            render_group(out, name, &group);
        }
    }
    out.push_str("</Element>");
}

fn attribute(out: &mut String, field: &FieldSpec, value: &FieldValue) {
    let text = match (field.lookup, value.as_u64()) {
        (Some(lookup), Some(raw)) => match lookup(raw) {
            Some(name) => name.to_string(),
            None => raw.to_string(),
        },
        (None, Some(raw)) if field.hex => format!("0x{:x}", raw),
        _ => value.to_string(),
    };
    let _ = write!(out, " {}=\"{}\"", field.name, escape(text.as_str()));
}
