use std::borrow::Cow;
use std::io::{self, Write};

/// Quote a field when it contains a delimiter, quote or line break.
pub fn escape(field: &str) -> Cow<'_, str> {
    if field.contains(|c| matches!(c, ',' | '"' | '\n' | '\r')) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

pub fn write_row<W, I, S>(out: &mut W, fields: I) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut first = true;
    for field in fields {
        if !first {
            out.write_all(b",")?;
        }
        out.write_all(escape(field.as_ref()).as_bytes())?;
        first = false;
    }
    out.write_all(b"\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_only_when_needed() {
        assert_eq!(escape("mlkem512"), "mlkem512");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape(""), "");
    }

    #[test]
    fn writes_rows() {
        let mut out = Vec::new();
        write_row(&mut out, &["1", "", "x,y"]).unwrap();
        write_row(&mut out, vec![String::from("2")]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1,,\"x,y\"\n2\n");
    }
}
