//! Skein document writer

use super::{GENERATOR, SKEIN_NAMESPACE};
use crate::models::{Skein, SkeinNode};
use quick_xml::escape::escape;
use std::fmt::Write;

/// Can this character be stored in an XML 1.0 document?
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}')
}

/// Escape text content, dropping characters XML cannot hold
///
/// Carriage returns are written as character references so that readers
/// don't fold `\r\n` into `\n`.
pub fn escape_text(text: &str) -> String {
    let clean: String = text.chars().filter(|c| is_xml_char(*c)).collect();
    escape(clean.as_str()).replace('\r', "&#13;")
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "YES"
    } else {
        "NO"
    }
}

fn write_text_element(out: &mut String, tag: &str, value: Option<&str>) {
    if let Some(value) = value {
        let _ = writeln!(
            out,
            "    <{tag} xml:space=\"preserve\">{}</{tag}>",
            escape_text(value)
        );
    }
}

fn write_item(out: &mut String, node: &SkeinNode) {
    let _ = writeln!(out, "  <item nodeId=\"{}\">", node.id());

    write_text_element(out, "command", Some(node.command()));
    write_text_element(out, "result", node.actual());
    write_text_element(out, "ideal", node.ideal());
    write_text_element(out, "annotation", node.annotation());
    write_text_element(out, "commentary", node.commentary());

    let _ = writeln!(out, "    <played>{}</played>", yes_no(node.played()));
    let _ = writeln!(out, "    <changed>{}</changed>", yes_no(node.changed()));
    let _ = writeln!(
        out,
        "    <temporary score=\"{}\">{}</temporary>",
        node.temporary_score(),
        yes_no(node.is_temporary())
    );
    let _ = writeln!(out, "    <testSubItem>{}</testSubItem>", yes_no(node.is_test_sub_item()));

    if !node.children().is_empty() {
        out.push_str("    <children>\n");
        for child in node.children() {
            let _ = writeln!(out, "      <child nodeId=\"{}\"/>", child);
        }
        out.push_str("    </children>\n");
    }

    out.push_str("  </item>\n");
}

/// Serialize the attached part of the skein, items in pre-order
pub fn to_xml(skein: &Skein) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    let _ = writeln!(
        out,
        "<Skein rootNode=\"{}\" xmlns=\"{}\">",
        skein.root_item(),
        SKEIN_NAMESPACE
    );
    let _ = writeln!(out, "  <generator>{}</generator>", escape_text(GENERATOR));

    if let Some(active) = skein.active_item() {
        let _ = writeln!(out, "  <activeNode nodeId=\"{}\"/>", active);
    }
    if let Some(winning) = skein.winning_item() {
        let _ = writeln!(out, "  <winningNode nodeId=\"{}\"/>", winning);
    }

    for node in skein.iter() {
        write_item(&mut out, node);
    }

    out.push_str("</Skein>\n");
    out
}
