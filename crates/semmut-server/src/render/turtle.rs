//! Turtle templates, one per operation
//!
//! Templates receive the merged request/result context after dot escaping, so
//! every string they see already carries `\.` in place of `.`. Two filters turn
//! those strings into terms:
//!
//! - [`local_name`] keeps `\.` (a valid local-name escape) and escapes or
//!   percent-encodes everything else a prefixed name cannot hold
//! - [`literal`] restores the dots and produces a quoted string literal

use std::fmt::Write as _;

use serde_json::{Map, Value};

use super::escape::unescape_dots;
use super::RenderError;

/// Characters a local name may carry after a backslash
const LOCAL_NAME_ESCAPES: &str = "_~.-!$&'()*+,;=/?#@%";

/// A per-operation Turtle template
pub trait TurtleTemplate: Send + Sync {
    fn name(&self) -> &'static str;

    /// Render `context` into a complete document rooted at `base` (no trailing slash).
    fn render(&self, base: &str, context: &Map<String, Value>) -> Result<String, RenderError>;
}

/// Prefixed-name local part for an escaped string
pub fn local_name(escaped: &str) -> String {
    let mut out = String::with_capacity(escaped.len());
    let mut chars = escaped.chars().peekable();
    let mut first = true;

    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'.') => {
                chars.next();
                out.push_str("\\.");
            },
            '\\' => out.push_str("%5C"),
            c if c.is_ascii_alphanumeric() || c == '_' || c == ':' => out.push(c),
            '-' if !first => out.push('-'),
            c if LOCAL_NAME_ESCAPES.contains(c) => {
                out.push('\\');
                out.push(c);
            },
            c if is_pn_chars_base(c) || (!first && is_pn_chars_extra(c)) => out.push(c),
            c => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    let _ = write!(out, "%{byte:02X}");
                }
            },
        }
        first = false;
    }

    out
}

/// Non-ASCII `PN_CHARS_BASE` of the Turtle grammar
fn is_pn_chars_base(c: char) -> bool {
    matches!(c,
        '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

/// Non-ASCII characters `PN_CHARS` allows after the first position
fn is_pn_chars_extra(c: char) -> bool {
    matches!(c, '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

/// Quoted string literal for an escaped string
pub fn literal(escaped: &str) -> String {
    let raw = unescape_dots(escaped);
    let mut out = String::with_capacity(raw.len() + 2);
    out.push('"');
    for c in raw.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// One subject and its predicate/object pairs
#[derive(Debug, Clone)]
pub struct Statement {
    subject: String,
    pairs: Vec<(String, String)>,
}

impl Statement {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            pairs: Vec::new(),
        }
    }

    pub fn a(mut self, class: &str) -> Self {
        self.pairs.push(("a".to_string(), class.to_string()));
        self
    }

    pub fn add(&mut self, predicate: impl Into<String>, object: impl Into<String>) {
        self.pairs.push((predicate.into(), object.into()));
    }

    /// Add every non-null field as `mut:<key>`, skipping `skip`.
    pub fn add_fields(&mut self, fields: &Map<String, Value>, skip: &[&str], typed: &Typing) {
        for (key, value) in fields {
            if skip.contains(&key.as_str()) {
                continue;
            }
            let objects = terms(key, value, typed);
            if !objects.is_empty() {
                self.add(format!("mut:{}", local_name(key)), objects.join(", "));
            }
        }
    }

    fn write(&self, out: &mut String) {
        out.push_str(&self.subject);
        if self.pairs.is_empty() {
            out.push_str(" a mut:Resource .\n\n");
            return;
        }
        for (i, (predicate, object)) in self.pairs.iter().enumerate() {
            let separator = if i + 1 == self.pairs.len() { " ." } else { " ;" };
            let _ = write!(out, "\n    {predicate} {object}{separator}");
        }
        out.push_str("\n\n");
    }
}

/// Keys whose string values are typed instead of plain literals
#[derive(Debug, Clone, Copy, Default)]
pub struct Typing {
    pub integers: &'static [&'static str],
    pub booleans: &'static [&'static str],
}

fn terms(key: &str, value: &Value, typed: &Typing) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items
            .iter()
            .flat_map(|item| terms(key, item, typed))
            .collect(),
        Value::Object(fields) => {
            let mut nested = Statement::new("");
            nested.add_fields(fields, &[], typed);
            if nested.pairs.is_empty() {
                return Vec::new();
            }
            let body: Vec<String> = nested
                .pairs
                .iter()
                .map(|(p, o)| format!("{p} {o}"))
                .collect();
            vec![format!("[ {} ]", body.join(" ; "))]
        },
        Value::Bool(b) => vec![b.to_string()],
        Value::Number(n) => vec![n.to_string()],
        Value::String(s) => vec![scalar_term(key, s, typed)],
    }
}

fn scalar_term(key: &str, escaped: &str, typed: &Typing) -> String {
    let raw = unescape_dots(escaped);
    if typed.integers.contains(&key) {
        if let Ok(n) = raw.trim().parse::<i64>() {
            return n.to_string();
        }
    }
    if typed.booleans.contains(&key) {
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => return "true".to_string(),
            "false" | "0" => return "false".to_string(),
            _ => {},
        }
    }
    literal(escaped)
}

/// A document: prefixes, a provenance comment, then statements
pub struct TurtleDocument {
    out: String,
}

impl TurtleDocument {
    pub fn new(base: &str) -> Self {
        let mut out = String::new();
        let _ = writeln!(out, "@prefix rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#> .");
        let _ = writeln!(out, "@prefix xsd: <http://www.w3.org/2001/XMLSchema#> .");
        let _ = writeln!(out, "@prefix mut: <{base}/vocab#> .");
        let _ = writeln!(out, "@prefix variant: <{base}/variants/> .");
        let _ = writeln!(out, "@prefix reference: <{base}/references/> .");
        let _ = writeln!(out, "@prefix transcript: <{base}/transcripts/> .");
        out.push('\n');
        Self { out }
    }

    /// `# operation key=value ...`, values as escaped
    pub fn comment(&mut self, operation: &str, context: &Map<String, Value>, keys: &[&str]) {
        let _ = write!(self.out, "# {operation}");
        for key in keys {
            if let Some(Value::String(value)) = context.get(*key) {
                let single_line = value.replace(['\n', '\r'], " ");
                let _ = write!(self.out, " {key}={single_line}");
            }
        }
        self.out.push_str("\n\n");
    }

    pub fn push(&mut self, statement: &Statement) {
        statement.write(&mut self.out);
    }

    pub fn finish(self) -> String {
        self.out
    }
}

fn required<'a>(
    template: &'static str,
    context: &'a Map<String, Value>,
    key: &'static str,
) -> Result<&'a str, RenderError> {
    context
        .get(key)
        .and_then(Value::as_str)
        .ok_or(RenderError::MissingContext { template, key })
}

/// A single resource named by one request parameter
pub struct ResourceTemplate {
    pub name: &'static str,
    pub class: &'static str,
    pub prefix: &'static str,
    pub key: &'static str,
    pub typing: Typing,
}

impl TurtleTemplate for ResourceTemplate {
    fn name(&self) -> &'static str {
        self.name
    }

    fn render(&self, base: &str, context: &Map<String, Value>) -> Result<String, RenderError> {
        let id = required(self.name, context, self.key)?;

        let mut doc = TurtleDocument::new(base);
        doc.comment(self.name, context, &[self.key]);

        let mut statement = Statement::new(format!("{}:{}", self.prefix, local_name(id))).a(self.class);
        statement.add_fields(context, &[], &self.typing);
        doc.push(&statement);

        Ok(doc.finish())
    }
}

/// Service information, no request parameters
pub struct InfoTemplate;

impl TurtleTemplate for InfoTemplate {
    fn name(&self) -> &'static str {
        "info"
    }

    fn render(&self, base: &str, context: &Map<String, Value>) -> Result<String, RenderError> {
        let mut doc = TurtleDocument::new(base);
        doc.comment(self.name(), context, &[]);

        let mut statement = Statement::new(format!("<{base}/info>")).a("mut:ServiceInfo");
        statement.add_fields(context, &[], &Typing::default());
        doc.push(&statement);

        Ok(doc.finish())
    }
}

/// Transcripts of a genomic reference, one statement per transcript
pub struct TranscriptsTemplate;

const TRANSCRIPT_TYPING: Typing = Typing {
    integers: &[
        "cTransStart",
        "gTransStart",
        "chromTransStart",
        "cTransEnd",
        "gTransEnd",
        "chromTransEnd",
        "sortableTransEnd",
        "cCDSStart",
        "gCDSStart",
        "chromCDSStart",
        "cCDSStop",
        "gCDSStop",
        "chromCDSStop",
    ],
    booleans: &[],
};

impl TurtleTemplate for TranscriptsTemplate {
    fn name(&self) -> &'static str {
        "getTranscriptsAndInfo"
    }

    fn render(&self, base: &str, context: &Map<String, Value>) -> Result<String, RenderError> {
        let reference = required(self.name(), context, "genomicReference")?;

        let mut doc = TurtleDocument::new(base);
        doc.comment(self.name(), context, &["genomicReference", "geneName"]);

        let transcripts: Vec<&Map<String, Value>> = match context.get("TranscriptInfo") {
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
            Some(Value::Object(item)) => vec![item],
            _ => Vec::new(),
        };

        let mut root = Statement::new(format!("reference:{}", local_name(reference)))
            .a("mut:GenomicReference");
        root.add_fields(context, &["TranscriptInfo"], &Typing::default());

        let mut statements = Vec::with_capacity(transcripts.len());
        for transcript in transcripts {
            let id = transcript
                .get("id")
                .or_else(|| transcript.get("name"))
                .and_then(Value::as_str);

            match id {
                Some(id) => {
                    let subject = format!("transcript:{}", local_name(id));
                    root.add("mut:transcript", subject.clone());

                    let mut statement = Statement::new(subject).a("mut:Transcript");
                    statement.add_fields(transcript, &[], &TRANSCRIPT_TYPING);
                    statements.push(statement);
                },
                None => {
                    let inline = terms("TranscriptInfo", &Value::Object(transcript.clone()), &TRANSCRIPT_TYPING);
                    for term in inline {
                        root.add("mut:transcript", term);
                    }
                },
            }
        }

        doc.push(&root);
        for statement in &statements {
            doc.push(statement);
        }

        Ok(doc.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::escape::escape_map;
    use serde_json::json;

    fn context(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => escape_map(&map),
            _ => panic!("expected an object"),
        }
    }

    fn assert_valid_turtle(document: &str) {
        let errors: Vec<String> = oxttl::TurtleParser::new()
            .for_slice(document.as_bytes())
            .filter_map(Result::err)
            .map(|e| e.to_string())
            .collect();
        assert!(errors.is_empty(), "invalid Turtle {errors:?} in:\n{document}");
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("AB026906\\.1:c\\.274G>T"), "AB026906\\.1:c\\.274G%3ET");
        assert_eq!(local_name("NM_003002\\.2"), "NM_003002\\.2");
        assert_eq!(
            local_name("AB026906\\.1(SDHD_v001):c\\.1_2del"),
            "AB026906\\.1\\(SDHD_v001\\):c\\.1_2del"
        );
        assert_eq!(local_name("-a-b"), "\\-a-b");
        assert_eq!(local_name("a b\\c"), "a%20b%5Cc");
    }

    #[test]
    fn test_local_name_keeps_only_name_characters() {
        assert_eq!(local_name("\u{C4}\u{E9}x"), "\u{C4}\u{E9}x");
        assert_eq!(local_name("x\u{B2}\u{AA}"), "x%C2%B2%C2%AA");
        // middle dot may follow but not start a name
        assert_eq!(local_name("a\u{B7}"), "a\u{B7}");
        assert_eq!(local_name("\u{B7}a"), "%C2%B7a");
    }

    #[test]
    fn test_unusual_variants_render_valid_turtle() {
        let template = ResourceTemplate {
            name: "runMutalyzer",
            class: "mut:NameCheck",
            prefix: "variant",
            key: "variant",
            typing: Typing::default(),
        };

        for variant in [
            "AB026906.1:c.274G>T",
            "NM_003002.2:c.274+1G>T",
            "NM_003002.2:c.[274G>T;300del]",
            "x\u{B2}\u{AA}",
            "-\u{B7}\u{E9} <\\> \"q\" #x\nnext",
        ] {
            let ctx = context(json!({
                "variant": variant,
                "nested": {"a": {"b": "c.d"}, "e": []},
                "empty": {}
            }));
            let out = template.render("http://localhost:8888", &ctx).unwrap();
            assert_valid_turtle(&out);
        }
    }

    #[test]
    fn test_literal_restores_dots() {
        assert_eq!(literal("AB026906\\.1"), "\"AB026906.1\"");
        assert_eq!(literal("say \"hi\"\nnow"), "\"say \\\"hi\\\"\\nnow\"");
    }

    #[test]
    fn test_resource_template() {
        let template = ResourceTemplate {
            name: "runMutalyzer",
            class: "mut:NameCheck",
            prefix: "variant",
            key: "variant",
            typing: Typing {
                integers: &["errors"],
                booleans: &[],
            },
        };
        let ctx = context(json!({
            "variant": "AB026906.1:c.3_4insG",
            "errors": "0",
            "transcriptDescriptions": ["AB026906.1(SDHD_v001):c.3_4insG"],
            "messages": [{"errorcode": "WSPLICE", "message": "Splice site."}],
            "sourceGi": null
        }));

        let out = template.render("http://localhost:8888", &ctx).unwrap();

        assert!(out.contains("@prefix mut: <http://localhost:8888/vocab#> ."));
        assert!(out.contains("# runMutalyzer variant=AB026906\\.1:c\\.3_4insG"));
        assert!(out.contains("variant:AB026906\\.1:c\\.3_4insG\n    a mut:NameCheck ;"));
        assert!(out.contains("mut:errors 0 ;"));
        assert!(out.contains("mut:variant \"AB026906.1:c.3_4insG\""));
        assert!(out.contains("mut:messages [ mut:errorcode \"WSPLICE\" ; mut:message \"Splice site.\" ]"));
        assert!(!out.contains("sourceGi"));
        assert!(out.trim_end().ends_with(" ."));
        assert_valid_turtle(&out);
    }

    #[test]
    fn test_resource_template_requires_its_key() {
        let template = ResourceTemplate {
            name: "checkSyntax",
            class: "mut:SyntaxCheck",
            prefix: "variant",
            key: "variant",
            typing: Typing::default(),
        };
        assert!(matches!(
            template.render("http://localhost:8888", &Map::new()),
            Err(RenderError::MissingContext { key: "variant", .. })
        ));
    }

    #[test]
    fn test_transcripts_template() {
        let ctx = context(json!({
            "genomicReference": "NG_012337.1",
            "geneName": "SDHD",
            "TranscriptInfo": [
                {"id": "NM_003002.2", "name": "SDHD_v001", "cTransStart": "-62",
                 "proteinTranscript": {"id": "NP_002993.1", "name": "SDHD_i001"}},
                {"name": "SDHD_v002"}
            ]
        }));

        let out = TranscriptsTemplate.render("http://localhost:8888", &ctx).unwrap();

        assert!(out.contains("reference:NG_012337\\.1\n    a mut:GenomicReference ;"));
        assert!(out.contains("mut:geneName \"SDHD\""));
        assert!(out.contains("mut:transcript transcript:NM_003002\\.2"));
        assert!(out.contains("mut:transcript transcript:SDHD_v002"));
        assert!(out.contains("transcript:NM_003002\\.2\n    a mut:Transcript ;"));
        assert!(out.contains("mut:cTransStart -62"));
        assert!(out.contains("mut:proteinTranscript [ mut:id \"NP_002993.1\" ; mut:name \"SDHD_i001\" ]"));
        assert_valid_turtle(&out);
    }

    #[test]
    fn test_info_template() {
        let ctx = context(json!({"version": "2.0.35", "versionParts": {"string": ["2", "0", "35"]}}));
        let out = InfoTemplate.render("http://localhost:8888", &ctx).unwrap();

        assert!(out.contains("<http://localhost:8888/info>\n    a mut:ServiceInfo ;"));
        assert!(out.contains("mut:version \"2.0.35\""));
        assert!(out.contains("mut:versionParts [ mut:string \"2\", \"0\", \"35\" ]"));
        assert_valid_turtle(&out);
    }
}
