//! Block parser: recognizes keyword blocks and fills a [`Document`].
//!
//! The parser is a state machine over block context. A `*` at the start of a
//! line always re-enters keyword recognition; the keyword word that follows
//! selects the block state through [`KEYWORDS`]. Records inside `NODE` and
//! `ELEMENT_*` blocks have a fixed field layout, each field preceded by exactly
//! one separator token (a comma or a run of blanks).
//!
//! Each input is parsed into a staging document and merged into the target
//! only when the whole input succeeded, so a failed input leaves the target
//! untouched.

use std::io::BufRead;

use tracing::{debug, warn};

use crate::error::{IdKind, KeyfileError, Result};
use crate::lexer::{Lexer, SpannedToken, Token};
use crate::mesh::{Document, Element, Node, NodeId, PartId, ABSENT_NODE, NODES_PER_ELEMENT};
use crate::options::{DuplicateNodePolicy, ParseOptions};

/// Kind of block a keyword opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    /// Node coordinates.
    Node,
    /// Element connectivity.
    Element,
    /// Part names.
    Part,
}

/// Recognized keywords (matched case-insensitively, whole word only).
pub const KEYWORDS: &[(&str, Block)] = &[
    ("NODE", Block::Node),
    ("ELEMENT_SOLID", Block::Element),
    ("ELEMENT_SHELL", Block::Element),
    ("ELEMENT_BEAM", Block::Element),
    ("PART", Block::Part),
    ("PART_INERTIA", Block::Part),
];

/// Look up the block a keyword opens.
pub fn block_for_keyword(word: &str) -> Option<Block> {
    KEYWORDS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(word))
        .map(|&(_, block)| block)
}

/// Block context of the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    /// Outside any recognized block.
    SeekKeyword,
    /// Inside `*NODE`.
    InNode,
    /// Inside `*ELEMENT_*`.
    InElement,
    /// Inside `*PART`, waiting for a name line.
    InPart,
    /// Inside `*PART`, name read, waiting for the part id.
    InPartId,
}

impl From<Block> for BlockState {
    fn from(block: Block) -> Self {
        match block {
            Block::Node => BlockState::InNode,
            Block::Element => BlockState::InElement,
            Block::Part => BlockState::InPart,
        }
    }
}

/// What one parsed input contributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseSummary {
    /// Nodes added.
    pub nodes: usize,
    /// Elements added.
    pub elements: usize,
    /// Part names registered.
    pub parts: usize,
    /// Tokens read, including end of stream.
    pub tokens: usize,
    /// Lines read, including a final line without a newline.
    pub lines: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Done,
}

const NODE_FIELDS: [&str; 3] = ["x", "y", "z"];
const CONNECTIVITY_FIELDS: [&str; NODES_PER_ELEMENT] =
    ["n1", "n2", "n3", "n4", "n5", "n6", "n7", "n8"];

/// Parse keyfile text from a buffered reader into `doc`.
pub fn parse_reader<R: BufRead>(
    reader: R,
    doc: &mut Document,
    options: &ParseOptions,
) -> Result<ParseSummary> {
    let parser = BlockParser::new(Lexer::new(reader), doc, options);
    let (staged, summary) = parser.run()?;
    doc.merge(staged)?;
    Ok(summary)
}

/// Parse keyfile text held in memory into `doc`.
pub fn parse_str(text: &str, doc: &mut Document, options: &ParseOptions) -> Result<ParseSummary> {
    parse_reader(text.as_bytes(), doc, options)
}

/// State machine turning tokens into mesh records.
struct BlockParser<'a, R> {
    lexer: Lexer<R>,
    base: &'a Document,
    staged: Document,
    options: &'a ParseOptions,
    state: BlockState,
    part_name: String,
    parts: usize,
    tokens: usize,
}

impl<'a, R: BufRead> BlockParser<'a, R> {
    fn new(lexer: Lexer<R>, base: &'a Document, options: &'a ParseOptions) -> Self {
        Self {
            lexer,
            base,
            staged: Document::new(),
            options,
            state: BlockState::SeekKeyword,
            part_name: String::new(),
            parts: 0,
            tokens: 0,
        }
    }

    fn run(mut self) -> Result<(Document, ParseSummary)> {
        loop {
            let tok = self.next()?;
            let flow = match tok.token {
                Token::EndOfStream => Flow::Done,
                Token::Asterisk => self.keyword()?,
                _ => match self.state {
                    BlockState::SeekKeyword => Flow::Continue,
                    BlockState::InNode => self.in_node(tok)?,
                    BlockState::InElement => self.in_element(tok)?,
                    BlockState::InPart => self.in_part(tok)?,
                    BlockState::InPartId => self.in_part_id(tok)?,
                },
            };
            if flow == Flow::Done {
                break;
            }
        }

        if self.state == BlockState::InPartId {
            warn!(name = %self.part_name, "part name without id at end of input");
        }

        let summary = ParseSummary {
            nodes: self.staged.node_count(),
            elements: self.staged.element_count(),
            parts: self.parts,
            tokens: self.tokens,
            lines: self.lexer.lines_read(),
        };
        Ok((self.staged, summary))
    }

    fn next(&mut self) -> Result<SpannedToken> {
        self.tokens += 1;
        self.lexer.next_token()
    }

    /// Keyword recognition after a line-leading `*`.
    fn keyword(&mut self) -> Result<Flow> {
        if self.state == BlockState::InPartId {
            warn!(name = %self.part_name, "part name without id, discarded");
        }
        let tok = self.next()?;
        match tok.token {
            Token::Word(word) => {
                self.state = match block_for_keyword(&word) {
                    Some(block) => {
                        debug!(keyword = %word, line = tok.line, "entering block");
                        block.into()
                    }
                    None => {
                        debug!(keyword = %word, line = tok.line, "skipping block");
                        BlockState::SeekKeyword
                    }
                };
                Ok(Flow::Continue)
            }
            Token::EndOfStream => Ok(Flow::Done),
            _ => {
                self.state = BlockState::SeekKeyword;
                Ok(Flow::Continue)
            }
        }
    }

    fn in_node(&mut self, tok: SpannedToken) -> Result<Flow> {
        match tok.token {
            Token::Whitespace(_) | Token::Newline | Token::Comment(_) => Ok(Flow::Continue),
            Token::Number(text) => self.node_record(&text, tok.line),
            other => self.unexpected(&other, tok.line, "NODE"),
        }
    }

    fn in_element(&mut self, tok: SpannedToken) -> Result<Flow> {
        match tok.token {
            Token::Whitespace(_) | Token::Newline | Token::Comment(_) => Ok(Flow::Continue),
            Token::Number(text) => self.element_record(&text, tok.line),
            other => self.unexpected(&other, tok.line, "ELEMENT"),
        }
    }

    fn in_part(&mut self, tok: SpannedToken) -> Result<Flow> {
        match tok.token {
            Token::Whitespace(_) | Token::Newline | Token::Comment(_) => Ok(Flow::Continue),
            Token::Word(first) => {
                self.part_name = first;
                loop {
                    let tok = self.next()?;
                    match tok.token {
                        Token::Newline => break,
                        Token::EndOfStream => return Ok(Flow::Done),
                        other => self.part_name.push_str(other.text()),
                    }
                }
                self.state = BlockState::InPartId;
                Ok(Flow::Continue)
            }
            other => self.unexpected(&other, tok.line, "PART"),
        }
    }

    fn in_part_id(&mut self, tok: SpannedToken) -> Result<Flow> {
        let Token::Number(text) = tok.token else {
            return Ok(Flow::Continue);
        };
        let id: PartId = parse_id(&text, tok.line, "part id")?;
        let name = std::mem::take(&mut self.part_name);
        if let Some(old) = self.staged.part_name(id).or_else(|| self.base.part_name(id)) {
            warn!(part = id, old = %old, new = %name, line = tok.line, "part renamed");
        }
        debug!(part = id, name = %name, "registered part");
        self.staged.set_part_name(id, name);
        self.parts += 1;
        self.state = BlockState::InPart;
        self.skip_line()
    }

    /// A token that has no meaning in the current block.
    fn unexpected(&mut self, token: &Token, line: usize, block: &str) -> Result<Flow> {
        if self.options.is_strict() {
            return Err(KeyfileError::syntax(
                line,
                format!("unexpected {} in {block} block", token.describe()),
            ));
        }
        warn!(line, block, token = %token.describe(), "leaving block on unexpected token");
        self.state = BlockState::SeekKeyword;
        Ok(Flow::Continue)
    }

    fn node_record(&mut self, id_text: &str, line: usize) -> Result<Flow> {
        let id: NodeId = parse_id(id_text, line, "node id")?;
        if id == ABSENT_NODE {
            return Err(KeyfileError::syntax(line, "node id 0 is reserved"));
        }

        let mut coords = [0.0; 3];
        for (field, coord) in NODE_FIELDS.iter().zip(coords.iter_mut()) {
            self.expect_separator(field)?;
            let (text, line) = self.expect_number(field)?;
            *coord = text.parse::<f64>().map_err(|_| {
                KeyfileError::syntax(line, format!("invalid {field} coordinate '{text}'"))
            })?;
        }

        self.add_node(Node { id, coords }, line)?;
        self.skip_line()
    }

    fn element_record(&mut self, id_text: &str, line: usize) -> Result<Flow> {
        let id = parse_id(id_text, line, "element id")?;

        self.expect_separator("part id")?;
        let part_id = self.expect_id("part id")?;

        let mut nodes = [ABSENT_NODE; NODES_PER_ELEMENT];
        for (field, slot) in CONNECTIVITY_FIELDS.iter().zip(nodes.iter_mut()) {
            self.expect_separator(field)?;
            *slot = self.expect_id(field)?;
        }

        if self.base.contains_element(id) || self.staged.contains_element(id) {
            return Err(KeyfileError::duplicate(IdKind::Element, id, Some(line)));
        }
        self.staged.insert_element(Element::new(id, part_id, nodes))?;
        self.skip_line()
    }

    fn add_node(&mut self, node: Node, line: usize) -> Result<()> {
        if self.base.contains_node(node.id) || self.staged.contains_node(node.id) {
            return match self.options.duplicate_nodes {
                DuplicateNodePolicy::KeepFirst => {
                    warn!(node = node.id, line, "duplicate node ignored, first definition kept");
                    Ok(())
                }
                DuplicateNodePolicy::Reject => {
                    Err(KeyfileError::duplicate(IdKind::Node, node.id, Some(line)))
                }
            };
        }
        self.staged.insert_node(node)
    }

    /// Discard the rest of the current line.
    fn skip_line(&mut self) -> Result<Flow> {
        loop {
            match self.next()?.token {
                Token::Newline => return Ok(Flow::Continue),
                Token::EndOfStream => return Ok(Flow::Done),
                _ => {}
            }
        }
    }

    fn expect_separator(&mut self, field: &str) -> Result<()> {
        let tok = self.next()?;
        if tok.token.is_separator() {
            Ok(())
        } else {
            Err(KeyfileError::syntax(
                tok.line,
                format!("expected separator before {field}, found {}", tok.token.describe()),
            ))
        }
    }

    fn expect_number(&mut self, field: &str) -> Result<(String, usize)> {
        let tok = self.next()?;
        match tok.token {
            Token::Number(text) => Ok((text, tok.line)),
            other => Err(KeyfileError::syntax(
                tok.line,
                format!("expected number for {field}, found {}", other.describe()),
            )),
        }
    }

    fn expect_id(&mut self, field: &str) -> Result<u64> {
        let (text, line) = self.expect_number(field)?;
        parse_id(&text, line, field)
    }
}

fn parse_id(text: &str, line: usize, field: &str) -> Result<u64> {
    text.parse()
        .map_err(|_| KeyfileError::syntax(line, format!("invalid {field} '{text}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ParseMode;
    use approx::assert_relative_eq;

    fn parse(input: &str) -> Result<Document> {
        let mut doc = Document::new();
        parse_str(input, &mut doc, &ParseOptions::default())?;
        Ok(doc)
    }

    fn parse_strict(input: &str) -> Result<Document> {
        let mut doc = Document::new();
        let options = ParseOptions {
            mode: ParseMode::Strict,
            ..Default::default()
        };
        parse_str(input, &mut doc, &options)?;
        Ok(doc)
    }

    const PLATE: &str = "*NODE
1,0.0,0.0,0.0
2,1.0,0.0,0.0
*ELEMENT_SHELL
10,5,1,2,0,0,0,0,0,0
*PART
Plate
5
";

    #[test]
    fn test_parse_plate() {
        let doc = parse(PLATE).unwrap();
        assert_eq!(doc.node_count(), 2);
        assert_eq!(doc.node(1).unwrap().coords, [0.0, 0.0, 0.0]);
        assert_eq!(doc.node(2).unwrap().coords, [1.0, 0.0, 0.0]);

        assert_eq!(doc.element_count(), 1);
        let e = doc.element(10).unwrap();
        assert_eq!(e.part_id, 5);
        assert_eq!(e.nodes, [1, 2, 0, 0, 0, 0, 0, 0]);

        assert_eq!(doc.part_name(5), Some("Plate"));
    }

    #[test]
    fn test_summary() {
        let mut doc = Document::new();
        let summary = parse_str(PLATE, &mut doc, &ParseOptions::default()).unwrap();
        assert_eq!(summary.nodes, 2);
        assert_eq!(summary.elements, 1);
        assert_eq!(summary.parts, 1);
        assert_eq!(summary.lines, 8);
        assert!(summary.tokens > 0);

        let summary = parse_str("*NODE\n1,0,0,0", &mut Document::new(), &ParseOptions::default()).unwrap();
        assert_eq!(summary.lines, 2);
    }

    #[test]
    fn test_crlf_input() {
        let doc = parse(&PLATE.replace('\n', "\r\n")).unwrap();
        assert_eq!(doc.part_name(5), Some("Plate"));
        assert_eq!(doc.node(2).unwrap().coords, [1.0, 0.0, 0.0]);
        assert_eq!(doc.element(10).unwrap().nodes, [1, 2, 0, 0, 0, 0, 0, 0]);

        let doc = parse("*PART\r\nLeft Wing\r\n7\r\n").unwrap();
        assert_eq!(doc.part_name(7), Some("Left Wing"));
    }

    #[test]
    fn test_utf8_part_name() {
        let doc = parse("*PART\nTräger\n1\n").unwrap();
        assert_eq!(doc.part_name(1), Some("Träger"));
    }

    #[test]
    fn test_missing_coordinates() {
        let err = parse("*NODE\n1 0.0\n").unwrap_err();
        match err {
            KeyfileError::Syntax { line, message } => {
                assert_eq!(line, 2);
                assert!(message.contains("before y"), "{message}");
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_failed_input_leaves_document_untouched() {
        let mut doc = Document::new();
        parse_str(PLATE, &mut doc, &ParseOptions::default()).unwrap();
        let before = doc.clone();

        let bad = "*NODE\n3,1.0,1.0,1.0\n4,1.0\n";
        assert!(parse_str(bad, &mut doc, &ParseOptions::default()).is_err());
        assert_eq!(doc, before);
        assert!(!doc.contains_node(3));
    }

    #[test]
    fn test_whitespace_and_fixed_width_records() {
        let input = "*NODE
       1             0.5            -1.0          2.5e+1
       2             1.0             0.0             0.0
*ELEMENT_SOLID
       7       3       1       2       1       2       1       2       1       2
";
        let doc = parse(input).unwrap();
        assert_relative_eq!(doc.node(1).unwrap().coords[2], 25.0);
        assert_relative_eq!(doc.node(1).unwrap().coords[1], -1.0);
        assert_eq!(doc.element(7).unwrap().nodes, [1, 2, 1, 2, 1, 2, 1, 2]);
    }

    #[test]
    fn test_comments_inside_blocks() {
        let input = "$ model
*NODE
$#   nid               x               y               z
1,0,0,0
$ more
2,1,0,0
";
        let doc = parse(input).unwrap();
        assert_eq!(doc.node_count(), 2);
    }

    #[test]
    fn test_trailing_fields_ignored() {
        let doc = parse("*NODE\n1,0,0,0,7,7\n*ELEMENT_BEAM\n3,1,1,1,0,0,0,0,0,0,99\n").unwrap();
        assert_eq!(doc.node_count(), 1);
        assert_eq!(doc.element(3).unwrap().nodes[0], 1);
    }

    #[test]
    fn test_keywords_case_insensitive_exact() {
        let doc = parse("*node\n1,0,0,0\n*Element_Shell\n1,1,1,0,0,0,0,0,0,0\n").unwrap();
        assert_eq!(doc.node_count(), 1);
        assert_eq!(doc.element_count(), 1);

        // No prefix matching: the block is skipped entirely
        let doc = parse("*NODE_RIGID_SURFACE\n1,0,0,0\n").unwrap();
        assert_eq!(doc.node_count(), 0);
    }

    #[test]
    fn test_unknown_block_skipped() {
        let input = "*KEYWORD
*CONTROL_TERMINATION
0.1,0,0.0,0.0,0.0
*NODE
1,0,0,0
*END
";
        let doc = parse(input).unwrap();
        assert_eq!(doc.node_count(), 1);
    }

    #[test]
    fn test_block_lookup_table() {
        assert_eq!(block_for_keyword("PART_INERTIA"), Some(Block::Part));
        assert_eq!(block_for_keyword("element_beam"), Some(Block::Element));
        assert_eq!(block_for_keyword("ELEMENT"), None);
        assert_eq!(block_for_keyword("NODES"), None);
    }

    #[test]
    fn test_element_errors() {
        let err = parse("*ELEMENT_SHELL\n1,1,1,2,3\n").unwrap_err();
        assert_eq!(err.line(), Some(2));
        assert!(err.to_string().contains("n4"), "{err}");

        let err = parse("*ELEMENT_SHELL\n1,P,1,2,3,4,0,0,0,0\n").unwrap_err();
        assert!(err.to_string().contains("part id"), "{err}");

        let err = parse("*ELEMENT_SHELL\n1,1,1,2,3,4,0,0,0,x\n").unwrap_err();
        assert!(err.to_string().contains("n8"), "{err}");
    }

    #[test]
    fn test_two_separators_is_an_error() {
        let err = parse("*NODE\n1, 0.0, 0.0, 0.0\n").unwrap_err();
        assert!(matches!(err, KeyfileError::Syntax { line: 2, .. }));
    }

    #[test]
    fn test_invalid_ids() {
        assert!(parse("*NODE\n0,0,0,0\n").is_err());
        assert!(parse("*NODE\n-4,0,0,0\n").is_err());
        assert!(parse("*NODE\n1.5,0,0,0\n").is_err());
        assert!(parse("*ELEMENT_SOLID\n1,1,-2,0,0,0,0,0,0,0\n").is_err());
    }

    #[test]
    fn test_duplicate_element_in_one_file() {
        let err = parse("*ELEMENT_SHELL\n1,1,0,0,0,0,0,0,0,0\n1,2,0,0,0,0,0,0,0,0\n").unwrap_err();
        assert!(matches!(
            err,
            KeyfileError::DuplicateId {
                kind: IdKind::Element,
                id: 1,
                line: Some(3)
            }
        ));
    }

    #[test]
    fn test_duplicate_element_across_inputs() {
        let mut doc = Document::new();
        let options = ParseOptions::default();
        parse_str(PLATE, &mut doc, &options).unwrap();
        let err = parse_str(
            "*NODE\n3,0,1,0\n*ELEMENT_SOLID\n10,6,3,0,0,0,0,0,0,0\n",
            &mut doc,
            &options,
        )
        .unwrap_err();
        assert!(matches!(err, KeyfileError::DuplicateId { id: 10, .. }));
        assert!(!doc.contains_node(3));
    }

    #[test]
    fn test_duplicate_node_policies() {
        let input = "*NODE\n1,0,0,0\n1,9,9,9\n";
        let doc = parse(input).unwrap();
        assert_eq!(doc.node_count(), 1);
        assert_eq!(doc.node(1).unwrap().coords, [0.0, 0.0, 0.0]);

        let mut doc = Document::new();
        let options = ParseOptions {
            duplicate_nodes: DuplicateNodePolicy::Reject,
            ..Default::default()
        };
        let err = parse_str(input, &mut doc, &options).unwrap_err();
        assert!(matches!(
            err,
            KeyfileError::DuplicateId {
                kind: IdKind::Node,
                line: Some(3),
                ..
            }
        ));
    }

    #[test]
    fn test_permissive_fallback() {
        let input = "*NODE\n1,0,0,0\nstray\n2,1,0,0\n";
        let doc = parse(input).unwrap();
        // Node 2 follows the stray word, after the parser left the block
        assert_eq!(doc.node_count(), 1);

        let err = parse_strict(input).unwrap_err();
        assert!(matches!(err, KeyfileError::Syntax { line: 3, .. }));
    }

    #[test]
    fn test_part_names() {
        let input = "*PART
Left Wing  skin
$ pid secid mid
        12         1         1
*PART_INERTIA
Ballast
3 1 1
";
        let doc = parse(input).unwrap();
        assert_eq!(doc.part_name(12), Some("Left Wing  skin"));
        assert_eq!(doc.part_name(3), Some("Ballast"));
    }

    #[test]
    fn test_several_parts_in_one_block() {
        let input = "*PART\nHull\n1,1,1\nDeck\n2,1,1\n";
        let doc = parse_strict(input).unwrap();
        assert_eq!(doc.part_name(1), Some("Hull"));
        assert_eq!(doc.part_name(2), Some("Deck"));
    }

    #[test]
    fn test_part_rename_last_wins() {
        let doc = parse("*PART\nOld\n4\n*PART\nNew\n4\n").unwrap();
        assert_eq!(doc.part_name(4), Some("New"));
    }

    #[test]
    fn test_part_without_name_is_fine() {
        let doc = parse("*ELEMENT_SHELL\n1,77,0,0,0,0,0,0,0,0\n").unwrap();
        assert_eq!(doc.part_name(77), None);
        assert_eq!(doc.part_ids(), vec![77]);
    }

    #[test]
    fn test_elements_before_nodes() {
        let doc = parse("*ELEMENT_SHELL\n1,1,5,6,0,0,0,0,0,0\n*NODE\n5,0,0,0\n6,1,0,0\n").unwrap();
        assert!(doc.check_references().is_ok());
    }

    #[test]
    fn test_empty_and_comment_only_input() {
        assert!(parse("").unwrap().is_empty());
        assert!(parse("$ nothing here\n$ at all").unwrap().is_empty());
        assert!(parse("*").unwrap().is_empty());
    }
}
