/// Classification of one raw input line.
#[derive(Clone, Debug, PartialEq)]
pub enum Record<T> {
    Data(T),
    Header,
    Blank,
    Unparsable,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EdgeRecord {
    pub source: String,
    pub target: String,
    /// `None` when the weight column is missing or not an integer.
    pub weight: Option<u64>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PositionRecord {
    pub node: String,
    pub x: f64,
    pub y: f64,
}

pub const EDGE_HEADER: &str = "source";
pub const POSITION_HEADER: &str = "node";

fn split_fields(line: &str) -> Option<(&str, Option<&str>, Option<&str>)> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return None;
    }

    let mut fields = line.split(',').map(str::trim);
    let first = fields.next().unwrap_or_default();
    Some((first, fields.next(), fields.next()))
}

/// Classifies one edge-list line. Only the first line of a source may be a
/// header; later a `source` id is an ordinary node.
pub fn parse_edge_line(line: &str, first_line: bool) -> Record<EdgeRecord> {
    let Some((source, target, weight)) = split_fields(line) else {
        return Record::Blank;
    };

    if source.is_empty() {
        return Record::Unparsable;
    }
    if first_line && source.eq_ignore_ascii_case(EDGE_HEADER) {
        return Record::Header;
    }

    let Some(target) = target.filter(|target| !target.is_empty()) else {
        return Record::Unparsable;
    };

    Record::Data(EdgeRecord {
        source: source.to_string(),
        target: target.to_string(),
        weight: weight.and_then(|weight| weight.parse::<u64>().ok()),
    })
}

pub fn parse_position_line(line: &str, first_line: bool) -> Record<PositionRecord> {
    let Some((node, x, y)) = split_fields(line) else {
        return Record::Blank;
    };

    if node.is_empty() {
        return Record::Unparsable;
    }
    if first_line && node.eq_ignore_ascii_case(POSITION_HEADER) {
        return Record::Header;
    }

    let coordinate = |value: Option<&str>| {
        value
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| value.is_finite())
    };

    match (coordinate(x), coordinate(y)) {
        (Some(x), Some(y)) => Record::Data(PositionRecord {
            node: node.to_string(),
            x,
            y,
        }),
        _ => Record::Unparsable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_line_with_weight() {
        assert_eq!(
            parse_edge_line("A,B,10", false),
            Record::Data(EdgeRecord {
                source: "A".into(),
                target: "B".into(),
                weight: Some(10),
            })
        );
    }

    #[test]
    fn edge_header_is_case_insensitive() {
        assert_eq!(parse_edge_line("source,target,weight", true), Record::Header);
        assert_eq!(parse_edge_line("Source,Target,Weight\r", true), Record::Header);
    }

    #[test]
    fn bad_weight_is_unknown_not_fatal() {
        let Record::Data(record) = parse_edge_line("a,b,heavy", false) else {
            panic!("expected data record");
        };
        assert_eq!(record.weight, None);

        let Record::Data(record) = parse_edge_line("a,b", false) else {
            panic!("expected data record");
        };
        assert_eq!(record.weight, None);
    }

    #[test]
    fn blank_and_unparsable_edges() {
        assert_eq!(parse_edge_line("", false), Record::Blank);
        assert_eq!(parse_edge_line("   \r", false), Record::Blank);
        assert_eq!(parse_edge_line(",b,1", false), Record::Unparsable);
        assert_eq!(parse_edge_line("lonely", false), Record::Unparsable);
    }

    #[test]
    fn position_headers() {
        assert_eq!(parse_position_line("node,x,y", true), Record::Header);
        assert_eq!(parse_position_line("Node,xPos,yPos", true), Record::Header);
    }

    #[test]
    fn position_line_parses_floats() {
        assert_eq!(
            parse_position_line("n1,-1.5,2e3", false),
            Record::Data(PositionRecord {
                node: "n1".into(),
                x: -1.5,
                y: 2000.0,
            })
        );
    }

    #[test]
    fn position_line_rejects_non_finite_and_missing() {
        assert_eq!(parse_position_line("n1,NaN,0", false), Record::Unparsable);
        assert_eq!(parse_position_line("n1,1", false), Record::Unparsable);
        assert_eq!(parse_position_line("n1,abc,1", false), Record::Unparsable);
    }

    #[test]
    fn header_names_are_data_after_the_first_line() {
        assert_eq!(
            parse_edge_line("source,b,7", false),
            Record::Data(EdgeRecord {
                source: "source".into(),
                target: "b".into(),
                weight: Some(7),
            })
        );
        assert_eq!(
            parse_position_line("Node,1,2", false),
            Record::Data(PositionRecord {
                node: "Node".into(),
                x: 1.0,
                y: 2.0,
            })
        );
        assert_eq!(parse_position_line("node,x,y", false), Record::Unparsable);
    }

    #[test]
    fn negative_and_fractional_weights_are_unknown() {
        for line in ["a,b,-3", "a,b,10.5"] {
            let Record::Data(record) = parse_edge_line(line, false) else {
                panic!("expected data record for {line}");
            };
            assert_eq!(record.weight, None);
        }
    }
}
