//! Árvore do relatório XML do `nvidia-smi -q -x`.
//!
//! O relatório é reconstruído a cada ciclo: a raiz (`nvidia_smi_log`) contém
//! nós `gpu` misturados com metadados (`timestamp`, `driver_version`…).
//! Só interessam tags, filhos e texto; atributos são descartados.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// Um nó do relatório.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportNode {
    pub tag: String,
    /// Texto do nó antes do primeiro filho
    pub text: String,
    pub children: Vec<ReportNode>,
}

impl ReportNode {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_child(mut self, child: ReportNode) -> Self {
        self.children.push(child);
        self
    }

    /// Primeiro filho direto com a tag exata.
    pub fn find_child(&self, tag: &str) -> Option<&ReportNode> {
        self.children.iter().find(|c| c.tag == tag)
    }
}

/// Erros de parsing do relatório.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("XML inválido na posição {position}: {message}")]
    Xml { position: u64, message: String },

    #[error("Relatório vazio (nenhum elemento raiz)")]
    Empty,

    #[error("Tag não fechada: <{0}>")]
    Unclosed(String),

    #[error("Mais de um elemento raiz: <{0}>")]
    MultipleRoots(String),
}

/// Faz o parsing do XML completo em uma árvore de [`ReportNode`].
pub fn parse_report(xml: &str) -> Result<ReportNode, ReportError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<ReportNode> = Vec::new();
    let mut root: Option<ReportNode> = None;

    loop {
        let event = reader.read_event().map_err(|e| ReportError::Xml {
            position: reader.buffer_position(),
            message: e.to_string(),
        })?;

        match event {
            Event::Start(e) => stack.push(ReportNode::new(tag_name(&e))),
            Event::Empty(e) => attach(&mut stack, &mut root, ReportNode::new(tag_name(&e)))?,
            Event::End(_) => {
                if let Some(node) = stack.pop() {
                    attach(&mut stack, &mut root, node)?;
                }
            }
            Event::Text(e) => {
                if let Some(node) = stack.last_mut().filter(|n| n.children.is_empty()) {
                    let text = e.unescape().map_err(|err| ReportError::Xml {
                        position: reader.buffer_position(),
                        message: err.to_string(),
                    })?;
                    node.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                if let Some(node) = stack.last_mut().filter(|n| n.children.is_empty()) {
                    node.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::Eof => break,
            // Decl, DocType, comentários, PIs
            _ => {}
        }
    }

    if let Some(open) = stack.pop() {
        return Err(ReportError::Unclosed(open.tag));
    }
    root.ok_or(ReportError::Empty)
}

fn tag_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn attach(
    stack: &mut [ReportNode],
    root: &mut Option<ReportNode>,
    node: ReportNode,
) -> Result<(), ReportError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None if root.is_none() => *root = Some(node),
        None => return Err(ReportError::MultipleRoots(node.tag)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMI_SAMPLE: &str = r#"<?xml version="1.0" ?>
<!DOCTYPE nvidia_smi_log SYSTEM "nvsmi_device_v12.dtd">
<nvidia_smi_log>
    <timestamp>Sat Oct 17 12:00:00 2026</timestamp>
    <driver_version>550.54.14</driver_version>
    <attached_gpus>1</attached_gpus>
    <gpu id="00000000:01:00.0">
        <product_name>NVIDIA GeForce RTX 3080</product_name>
        <fb_memory_usage>
            <total>10240 MiB</total>
            <used>512 MiB</used>
        </fb_memory_usage>
        <temperature>
            <gpu_temp>45 C</gpu_temp>
        </temperature>
        <ecc_mode/>
    </gpu>
</nvidia_smi_log>
"#;

    #[test]
    fn parses_nvidia_smi_layout() {
        let root = parse_report(SMI_SAMPLE).unwrap();
        assert_eq!(root.tag, "nvidia_smi_log");
        assert_eq!(root.children.len(), 4);

        let gpu = root.find_child("gpu").unwrap();
        let used = gpu
            .find_child("fb_memory_usage")
            .and_then(|m| m.find_child("used"))
            .unwrap();
        assert_eq!(used.text, "512 MiB");
        assert!(gpu.find_child("ecc_mode").unwrap().text.is_empty());
    }

    #[test]
    fn find_child_returns_first_match() {
        let node = ReportNode::new("gpu")
            .with_child(ReportNode::new("clock").with_text("1"))
            .with_child(ReportNode::new("clock").with_text("2"));
        assert_eq!(node.find_child("clock").unwrap().text, "1");
        assert!(node.find_child("missing").is_none());
    }

    #[test]
    fn text_after_first_child_is_ignored() {
        let root = parse_report("<r><a>12 <b/> W</a></r>").unwrap();
        let a = root.find_child("a").unwrap();
        assert_eq!(a.text, "12");
        assert_eq!(a.children.len(), 1);
    }

    #[test]
    fn unescapes_entities() {
        let root = parse_report("<r><name>A &amp; B</name></r>").unwrap();
        assert_eq!(root.find_child("name").unwrap().text, "A & B");
    }

    #[test]
    fn rejects_mismatched_tags() {
        assert!(matches!(
            parse_report("<r><a></b></r>"),
            Err(ReportError::Xml { .. })
        ));
    }

    #[test]
    fn rejects_empty_document() {
        assert!(matches!(parse_report(""), Err(ReportError::Empty)));
        assert!(matches!(
            parse_report("<?xml version=\"1.0\"?>"),
            Err(ReportError::Empty)
        ));
    }

    #[test]
    fn rejects_second_root() {
        assert!(matches!(
            parse_report("<a/><b/>"),
            Err(ReportError::MultipleRoots(tag)) if tag == "b"
        ));
    }
}
