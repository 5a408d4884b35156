use scraper::{ElementRef, Html, Node};
use sxd_document::{dom, parser, Package};

use crate::error::DocumentError;

/// A fetched page, parsed into a tree that XPath queries can run against.
///
/// XML documents are kept as is. Anything else goes through an HTML5 parser first and is rebuilt
/// without namespaces, so that `//table//td` works on real world markup.
pub struct Document {
    package: Package,
}

impl Document {
    pub fn parse(raw: &str) -> Result<Self, DocumentError> {
        if is_xml(raw) {
            Self::parse_xml(raw)
        } else {
            Ok(Self::parse_html(raw))
        }
    }

    pub fn parse_xml(raw: &str) -> Result<Self, DocumentError> {
        let package = parser::parse(raw).map_err(|e| DocumentError::Xml(e.to_string()))?;
        Ok(Self { package })
    }

    pub fn parse_html(raw: &str) -> Self {
        let html = Html::parse_document(raw);
        let package = Package::new();
        {
            let doc = package.as_document();
            let root = html.root_element();
            let elem = graft(&doc, root);
            doc.root().append_child(elem);
        }
        Self { package }
    }

    pub fn as_dom(&self) -> dom::Document<'_> {
        self.package.as_document()
    }
}

fn is_xml(raw: &str) -> bool {
    let head = raw.trim_start();
    head.starts_with("<?xml")
        && !root_element(head)
            .map(|name| name.rsplit(':').next().unwrap_or(name))
            .is_some_and(|name| name.eq_ignore_ascii_case("html"))
}

/// Name of the first element, past declarations, processing instructions and comments.
fn root_element(raw: &str) -> Option<&str> {
    let mut rest = raw.trim_start();
    loop {
        let next = if let Some(pi) = rest.strip_prefix("<?") {
            &pi[pi.find("?>")? + 2..]
        } else if let Some(comment) = rest.strip_prefix("<!--") {
            &comment[comment.find("-->")? + 3..]
        } else if let Some(decl) = rest.strip_prefix("<!") {
            let end = decl.find('>')?;
            match decl[..end].find('[') {
                Some(subset) => &decl[subset + decl[subset..].find("]>")? + 2..],
                None => &decl[end + 1..],
            }
        } else {
            break;
        };
        rest = next.trim_start();
    }

    let tag = rest.strip_prefix('<')?;
    let end = tag
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(tag.len());
    Some(&tag[..end])
}

fn graft<'d>(doc: &dom::Document<'d>, source: ElementRef<'_>) -> dom::Element<'d> {
    let elem = doc.create_element(source.value().name());
    for (name, value) in source.value().attrs() {
        elem.set_attribute_value(name, value);
    }

    for child in source.children() {
        match child.value() {
            Node::Text(text) => elem.append_child(doc.create_text(text)),
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    elem.append_child(graft(doc, child));
                }
            }
            _ => (),
        }
    }

    elem
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(doc: &Document, xpath: &str) -> Vec<String> {
        let factory = sxd_xpath::Factory::new();
        let xpath = factory.build(xpath).unwrap().unwrap();
        let ctx = sxd_xpath::Context::new();
        match xpath.evaluate(&ctx, doc.as_dom().root()).unwrap() {
            sxd_xpath::Value::Nodeset(nodes) => nodes
                .document_order()
                .iter()
                .map(|n| n.string_value())
                .collect(),
            other => vec![other.string()],
        }
    }

    #[test]
    fn html_is_queryable() {
        let doc = Document::parse(
            r#"<!DOCTYPE html><html><head><title>Hello</title></head>
            <body><a class="next" href="/2">next<br>page</a><p>unclosed</body></html>"#,
        )
        .unwrap();

        assert_eq!(vec!["Hello"], texts(&doc, "//title/text()"));
        assert_eq!(vec!["/2"], texts(&doc, r#"//a[@class="next"]/@href"#));
        assert_eq!(vec!["nextpage"], texts(&doc, "//a"));
        assert_eq!(vec!["unclosed"], texts(&doc, "//p"));
    }

    #[test]
    fn xml_is_kept() {
        let doc = Document::parse(
            r#"<?xml version="1.0"?><feed><entry id="1"/><entry id="2"/></feed>"#,
        )
        .unwrap();

        assert_eq!(vec!["1", "2"], texts(&doc, "/feed/entry/@id"));
    }

    #[test]
    fn broken_xml() {
        assert!(Document::parse(r#"<?xml version="1.0"?><feed><entry></feed>"#).is_err());
    }

    #[test]
    fn xhtml_after_long_preamble_goes_through_html_parser() {
        let raw = format!(
            r#"<?xml version="1.0"?>
<!-- {} -->
<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN" "http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd">
<html xmlns="http://www.w3.org/1999/xhtml"><body><p>x</p></body></html>"#,
            "generated ".repeat(60)
        );
        let doc = Document::parse(&raw).unwrap();

        assert_eq!(vec!["x"], texts(&doc, "//p"));
    }

    #[test]
    fn root_element_skips_preamble() {
        assert_eq!(
            Some("feed"),
            root_element(r#"<?xml version="1.0"?><!-- <html> --><!DOCTYPE feed [<!ENTITY a "b">]><feed/>"#)
        );
        assert_eq!(Some("xhtml:html"), root_element("<?xml?>\n<xhtml:html>"));
        assert_eq!(None, root_element("<?xml version=\"1.0\"?><!-- unterminated"));
    }

    #[test]
    fn xhtml_goes_through_html_parser() {
        let doc = Document::parse(
            r#"<?xml version="1.0"?><html xmlns="http://www.w3.org/1999/xhtml"><body><p>x</p></body></html>"#,
        )
        .unwrap();

        assert_eq!(vec!["x"], texts(&doc, "//p"));
    }
}
