//! Built-in filter library

use crate::error::{Error, Result};
use crate::security::{self, HtmlEscaper};
use crate::value::Value;
use chrono::format::{Item, StrftimeItems};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::{Captures, Regex};
use std::fmt::Write;

type Builtin = fn(&Value, &Value) -> Result<Value>;

pub(super) const BUILTINS: &[(&str, Builtin)] = &[
    ("escape", escape),
    ("e", escape),
    ("safe", safe),
    ("escapejs", escapejs),
    ("add", add),
    ("addslashes", addslashes),
    ("capfirst", capfirst),
    ("center", center),
    ("cut", cut),
    ("date", date),
    ("time", time),
    ("default", default),
    ("default_if_none", default_if_none),
    ("divisibleby", divisibleby),
    ("first", first),
    ("floatformat", floatformat),
    ("get_digit", get_digit),
    ("iriencode", iriencode),
    ("join", join),
    ("last", last),
    ("length", length),
    ("length_is", length_is),
    ("linebreaks", linebreaks),
    ("linebreaksbr", linebreaksbr),
    ("linenumbers", linenumbers),
    ("ljust", ljust),
    ("lower", lower),
    ("make_list", make_list),
    ("phone2numeric", phone2numeric),
    ("pluralize", pluralize),
    ("random", random),
    ("removetags", removetags),
    ("rjust", rjust),
    ("slice", slice),
    ("stringformat", stringformat),
    ("striptags", striptags),
    ("title", title),
    ("truncatechars", truncatechars),
    ("truncatewords", truncatewords),
    ("upper", upper),
    ("urlencode", urlencode),
    ("urlize", urlize),
    ("urlizetrunc", urlizetrunc),
    ("wordcount", wordcount),
    ("wordwrap", wordwrap),
    ("yesno", yesno),
    ("float", float),
    ("integer", integer),
];

static TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^>]*?>").expect("filters: invalid tag pattern regex"));

static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"((((http|https)://)|www\.|\w+(\.com|\.net|\.org|\.info|\.biz|\.de)/))(?U:.*)[ ]")
        .expect("filters: invalid URL pattern regex")
});

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\w+@\w+\.\w{2,4})").expect("filters: invalid email pattern regex")
});

fn text_len(value: &Value) -> usize {
    value.to_string().chars().count()
}

fn escape(input: &Value, _: &Value) -> Result<Value> {
    Ok(Value::String(HtmlEscaper::escape(&input.to_string())))
}

fn safe(input: &Value, _: &Value) -> Result<Value> {
    Ok(input.clone())
}

fn escapejs(input: &Value, _: &Value) -> Result<Value> {
    Ok(Value::String(HtmlEscaper::escape_js(&input.to_string())))
}

fn add(input: &Value, param: &Value) -> Result<Value> {
    if input.is_number() && param.is_number() {
        if input.is_float() || param.is_float() {
            return Ok(Value::Float(input.float() + param.float()));
        }
        return Ok(Value::Integer(input.integer().wrapping_add(param.integer())));
    }
    Ok(Value::String(format!("{}{}", input, param)))
}

fn addslashes(input: &Value, _: &Value) -> Result<Value> {
    Ok(Value::String(HtmlEscaper::add_slashes(&input.to_string())))
}

fn capfirst(input: &Value, _: &Value) -> Result<Value> {
    let s = input.to_string();
    let mut chars = s.chars();
    Ok(Value::String(match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }))
}

fn center(input: &Value, param: &Value) -> Result<Value> {
    let width = usize::try_from(param.integer()).unwrap_or(0);
    let len = text_len(input);
    if width <= len {
        return Ok(input.clone());
    }
    let spaces = width - len;
    let left = spaces / 2 + spaces % 2;
    let right = spaces / 2;
    Ok(Value::String(format!(
        "{}{}{}",
        " ".repeat(left),
        input,
        " ".repeat(right)
    )))
}

fn cut(input: &Value, param: &Value) -> Result<Value> {
    let needle = param.to_string();
    if needle.is_empty() {
        return Ok(Value::String(input.to_string()));
    }
    Ok(Value::String(input.to_string().replace(&needle, "")))
}

fn format_time(input: &Value, param: &Value, default_format: &str) -> Result<Value> {
    let time = input.as_time().ok_or_else(|| {
        Error::type_error(format!(
            "Filter input must be a time value, got {}",
            input.type_name()
        ))
    })?;

    let format = match param {
        Value::Nil => default_format.to_string(),
        other => other.to_string(),
    };
    let items: Vec<Item<'_>> = StrftimeItems::new(&format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(Error::type_error(format!("Invalid time format '{}'", format)));
    }

    let mut output = String::new();
    write!(output, "{}", time.format_with_items(items.into_iter()))
        .map_err(|_| Error::type_error(format!("Cannot format time with '{}'", format)))?;
    Ok(Value::String(output))
}

fn date(input: &Value, param: &Value) -> Result<Value> {
    format_time(input, param, "%Y-%m-%d")
}

fn time(input: &Value, param: &Value) -> Result<Value> {
    format_time(input, param, "%H:%M:%S")
}

fn default(input: &Value, param: &Value) -> Result<Value> {
    if input.is_true() {
        Ok(input.clone())
    } else {
        Ok(param.clone())
    }
}

fn default_if_none(input: &Value, param: &Value) -> Result<Value> {
    if input.is_nil() {
        Ok(param.clone())
    } else {
        Ok(input.clone())
    }
}

fn divisibleby(input: &Value, param: &Value) -> Result<Value> {
    let divisor = param.integer();
    if divisor == 0 {
        return Ok(Value::Bool(false));
    }
    Ok(Value::Bool(input.integer().wrapping_rem(divisor) == 0))
}

fn first(input: &Value, _: &Value) -> Result<Value> {
    if input.can_slice() && !input.is_empty() {
        return Ok(input.index(0));
    }
    Ok(Value::String(String::new()))
}

fn last(input: &Value, _: &Value) -> Result<Value> {
    if input.can_slice() && !input.is_empty() {
        return Ok(input.index(input.len() - 1));
    }
    Ok(Value::String(String::new()))
}

/// Without a parameter one decimal is shown and whole numbers lose it;
/// a negative parameter trims the same way with that many decimals.
fn floatformat(input: &Value, param: &Value) -> Result<Value> {
    let value = input.float();

    let mut decimals = if param.is_nil() { -1 } else { param.integer() };
    let mut trim = !param.is_number();
    if decimals <= 0 {
        decimals = -decimals;
        trim = true;
    }

    if trim && value.fract() == 0.0 {
        return Ok(Value::Integer(value as i64));
    }

    let precision = usize::try_from(decimals).unwrap_or(0).min(64);
    Ok(Value::String(format!("{:.*}", precision, value)))
}

fn get_digit(input: &Value, param: &Value) -> Result<Value> {
    let position = param.integer();
    let s = input.to_string();
    if position <= 0 {
        return Ok(input.clone());
    }
    let digit = usize::try_from(position - 1)
        .ok()
        .and_then(|n| s.chars().rev().nth(n))
        .and_then(|c| c.to_digit(10));
    Ok(match digit {
        Some(d) => Value::Integer(i64::from(d)),
        None => input.clone(),
    })
}

fn iriencode(input: &Value, _: &Value) -> Result<Value> {
    Ok(Value::String(security::iri_encode(&input.to_string())))
}

fn join(input: &Value, param: &Value) -> Result<Value> {
    if !input.can_slice() {
        return Ok(input.clone());
    }
    let separator = param.to_string();
    let parts: Vec<String> = (0..input.len())
        .map(|i| input.index(i).to_string())
        .collect();
    Ok(Value::String(parts.join(&separator)))
}

fn length(input: &Value, _: &Value) -> Result<Value> {
    Ok(Value::from(input.len()))
}

fn length_is(input: &Value, param: &Value) -> Result<Value> {
    Ok(Value::Bool(
        i64::try_from(input.len()).unwrap_or(i64::MAX) == param.integer(),
    ))
}

/// Single newlines become `<br />`, blank lines separate `<p>` paragraphs
fn linebreaks(input: &Value, _: &Value) -> Result<Value> {
    let s = input.to_string();
    if s.is_empty() {
        return Ok(Value::String(s));
    }

    let lines: Vec<&str> = s.split('\n').collect();
    let mut output = String::new();
    let mut opened = false;

    for (idx, line) in lines.iter().enumerate() {
        if !opened {
            output.push_str("<p>");
            opened = true;
        }
        output.push_str(line);

        if idx + 1 < lines.len() && !line.trim().is_empty() {
            if lines[idx + 1].trim().is_empty() {
                output.push_str("</p>");
                opened = false;
            } else {
                output.push_str("<br />");
            }
        }
    }

    if opened {
        output.push_str("</p>");
    }
    Ok(Value::String(output))
}

fn linebreaksbr(input: &Value, _: &Value) -> Result<Value> {
    Ok(Value::String(input.to_string().replace('\n', "<br />")))
}

fn linenumbers(input: &Value, _: &Value) -> Result<Value> {
    let numbered: Vec<String> = input
        .to_string()
        .split('\n')
        .enumerate()
        .map(|(idx, line)| format!("{}. {}", idx + 1, line))
        .collect();
    Ok(Value::String(numbered.join("\n")))
}

fn ljust(input: &Value, param: &Value) -> Result<Value> {
    let width = usize::try_from(param.integer()).unwrap_or(0);
    let padding = width.saturating_sub(text_len(input));
    Ok(Value::String(format!("{}{}", input, " ".repeat(padding))))
}

fn rjust(input: &Value, param: &Value) -> Result<Value> {
    let width = usize::try_from(param.integer()).unwrap_or(0);
    let padding = width.saturating_sub(text_len(input));
    Ok(Value::String(format!("{}{}", " ".repeat(padding), input)))
}

fn lower(input: &Value, _: &Value) -> Result<Value> {
    Ok(Value::String(input.to_string().to_lowercase()))
}

fn upper(input: &Value, _: &Value) -> Result<Value> {
    Ok(Value::String(input.to_string().to_uppercase()))
}

fn make_list(input: &Value, _: &Value) -> Result<Value> {
    Ok(Value::List(
        input.to_string().chars().map(Value::from).collect(),
    ))
}

fn phone2numeric(input: &Value, _: &Value) -> Result<Value> {
    let converted = input
        .to_string()
        .chars()
        .map(|c| match c.to_ascii_lowercase() {
            'a' | 'b' | 'c' => '2',
            'd' | 'e' | 'f' => '3',
            'g' | 'h' | 'i' => '4',
            'j' | 'k' | 'l' => '5',
            'm' | 'n' | 'o' => '6',
            'p' | 'q' | 'r' | 's' => '7',
            't' | 'u' | 'v' => '8',
            'w' | 'x' | 'y' | 'z' => '9',
            _ => c,
        })
        .collect();
    Ok(Value::String(converted))
}

/// `n|pluralize`, `n|pluralize:"es"`, `n|pluralize:"y,ies"`
fn pluralize(input: &Value, param: &Value) -> Result<Value> {
    if !input.is_number() {
        return Err(Error::type_error("Filter 'pluralize' only works on numbers"));
    }
    let plural = input.integer() != 1;

    let suffixes = param.to_string();
    if suffixes.is_empty() {
        return Ok(Value::from(if plural { "s" } else { "" }));
    }

    let endings: Vec<&str> = suffixes.split(',').collect();
    match endings.as_slice() {
        [plural_suffix] => Ok(Value::from(if plural { *plural_suffix } else { "" })),
        [singular, plural_suffix] => Ok(Value::from(if plural {
            *plural_suffix
        } else {
            *singular
        })),
        _ => Err(Error::type_error(
            "Filter 'pluralize' takes at most 2 comma separated suffixes",
        )),
    }
}

fn random(input: &Value, _: &Value) -> Result<Value> {
    if !input.can_slice() || input.is_empty() {
        return Ok(input.clone());
    }
    let idx = rand::thread_rng().gen_range(0..input.len());
    Ok(input.index(idx))
}

fn removetags(input: &Value, param: &Value) -> Result<Value> {
    let mut s = input.to_string();
    for tag in param.to_string().split(',').map(str::trim) {
        if tag.is_empty() {
            continue;
        }
        let pattern = format!(r"(?i)</?{}(\s[^>]*)?/?>", regex::escape(tag));
        let re = Regex::new(&pattern)
            .map_err(|e| Error::type_error(format!("Invalid tag name '{}': {}", tag, e)))?;
        s = re.replace_all(&s, "").into_owned();
    }
    Ok(Value::String(s.trim().to_string()))
}

/// `value|slice:"from:to"` with either bound optional
fn slice(input: &Value, param: &Value) -> Result<Value> {
    let bounds = param.to_string();
    let (from, to) = bounds.split_once(':').ok_or_else(|| {
        Error::type_error("Slice must have the format 'from:to' (bounds may be omitted)")
    })?;

    if !input.can_slice() {
        return Ok(input.clone());
    }

    let len = input.len();
    let parse_bound = |bound: &str| bound.trim().parse::<i64>().ok().map(|n| n.max(0));

    let start = parse_bound(from)
        .map(|n| usize::try_from(n).unwrap_or(len).min(len))
        .unwrap_or(0);
    let end = parse_bound(to)
        .and_then(|n| usize::try_from(n).ok())
        .filter(|&n| n >= start && n <= len)
        .unwrap_or(len);

    Ok(input.slice(start, end))
}

/// printf-style formatting of the input with a single verb:
/// `%s %v %d %f %.Nf %x %X %q %%`, with optional `-` and width
fn stringformat(input: &Value, param: &Value) -> Result<Value> {
    let format = param.to_string();
    let mut output = String::new();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            output.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            output.push('%');
            continue;
        }

        let left_align = chars.next_if_eq(&'-').is_some();
        let mut width = String::new();
        while let Some(d) = chars.next_if(|c| c.is_ascii_digit()) {
            width.push(d);
        }
        let mut precision = None;
        if chars.next_if_eq(&'.').is_some() {
            let mut digits = String::new();
            while let Some(d) = chars.next_if(|c| c.is_ascii_digit()) {
                digits.push(d);
            }
            precision = Some(digits.parse::<usize>().unwrap_or(0));
        }

        let formatted = match chars.next() {
            Some('s') | Some('v') => match precision {
                Some(p) => input.to_string().chars().take(p).collect(),
                None => input.to_string(),
            },
            Some('d') => input.integer().to_string(),
            Some('f') => format!("{:.*}", precision.unwrap_or(6), input.float()),
            Some('x') => format!("{:x}", input.integer()),
            Some('X') => format!("{:X}", input.integer()),
            Some('q') => format!("{:?}", input.to_string()),
            Some(other) => {
                return Err(Error::type_error(format!(
                    "Unsupported verb '%{}' in stringformat",
                    other
                )))
            }
            None => return Err(Error::type_error("Incomplete verb in stringformat")),
        };

        let width = if width.is_empty() {
            0
        } else {
            width.parse::<usize>().map_err(|_| {
                Error::type_error(format!("Invalid width '{}' in stringformat", width))
            })?
        };
        let padded = if left_align {
            format!("{:<width$}", formatted, width = width)
        } else {
            format!("{:>width$}", formatted, width = width)
        };
        output.push_str(&padded);
    }

    Ok(Value::String(output))
}

fn striptags(input: &Value, _: &Value) -> Result<Value> {
    let stripped = TAG_REGEX.replace_all(&input.to_string(), "").into_owned();
    Ok(Value::String(stripped.trim().to_string()))
}

fn title(input: &Value, _: &Value) -> Result<Value> {
    let s = match input.as_str() {
        Some(s) => s.to_lowercase(),
        None => return Ok(Value::String(String::new())),
    };

    let mut output = String::with_capacity(s.len());
    let mut at_word_start = true;
    for c in s.chars() {
        if at_word_start {
            output.extend(c.to_uppercase());
        } else {
            output.push(c);
        }
        at_word_start = !(c.is_alphanumeric() || c == '_' || c == '\'');
    }
    Ok(Value::String(output))
}

fn truncatechars(input: &Value, param: &Value) -> Result<Value> {
    let s = input.to_string();
    let max = usize::try_from(param.integer()).unwrap_or(0);
    if max >= s.chars().count() {
        return Ok(input.clone());
    }
    if max >= 3 {
        let kept: String = s.chars().take(max - 3).collect();
        return Ok(Value::String(format!("{}...", kept)));
    }
    // No room for the ellipsis
    Ok(Value::String(s.chars().take(max).collect()))
}

fn truncatewords(input: &Value, param: &Value) -> Result<Value> {
    let s = input.to_string();
    let words: Vec<&str> = s.split_whitespace().collect();
    let max = usize::try_from(param.integer()).unwrap_or(0);
    if max == 0 {
        return Ok(Value::String(String::new()));
    }

    let mut kept: Vec<&str> = words.iter().take(max).copied().collect();
    if max < words.len() {
        kept.push("...");
    }
    Ok(Value::String(kept.join(" ")))
}

fn urlencode(input: &Value, _: &Value) -> Result<Value> {
    Ok(Value::String(security::url_encode(&input.to_string())))
}

fn truncate_title(title: &str, limit: Option<usize>) -> String {
    match limit {
        Some(limit) if limit > 3 && title.chars().count() > limit => {
            let kept: String = title.chars().take(limit - 3).collect();
            format!("{}...", kept)
        }
        _ => title.to_string(),
    }
}

fn urlize_text(input: &str, autoescape: bool, limit: Option<usize>) -> String {
    let linked = URL_REGEX.replace_all(input, |caps: &Captures<'_>| {
        let raw = caps[0].trim();
        let mut url = security::iri_encode(raw);
        if !url.starts_with("http") {
            url = format!("http://{}", url);
        }

        let mut title = truncate_title(raw, limit);
        if autoescape {
            title = HtmlEscaper::escape(&title);
        }
        format!(r#"<a href="{}" rel="nofollow">{}</a> "#, url, title)
    });

    EMAIL_REGEX
        .replace_all(&linked, |caps: &Captures<'_>| {
            let mail = &caps[0];
            format!(
                r#"<a href="mailto:{}">{}</a>"#,
                mail,
                truncate_title(mail, limit)
            )
        })
        .into_owned()
}

/// Turn URLs followed by a space and e-mail addresses into links
fn urlize(input: &Value, param: &Value) -> Result<Value> {
    let autoescape = match param {
        Value::Bool(b) => *b,
        _ => true,
    };
    Ok(Value::String(urlize_text(&input.to_string(), autoescape, None)))
}

fn urlizetrunc(input: &Value, param: &Value) -> Result<Value> {
    let limit = usize::try_from(param.integer()).ok();
    Ok(Value::String(urlize_text(&input.to_string(), true, limit)))
}

fn wordcount(input: &Value, _: &Value) -> Result<Value> {
    Ok(Value::from(input.to_string().split_whitespace().count()))
}

/// Wrap after every `n` words
fn wordwrap(input: &Value, param: &Value) -> Result<Value> {
    let per_line = match usize::try_from(param.integer()) {
        Ok(n) if n > 0 => n,
        _ => return Ok(input.clone()),
    };
    let s = input.to_string();
    let words: Vec<&str> = s.split_whitespace().collect();
    let lines: Vec<String> = words.chunks(per_line).map(|line| line.join(" ")).collect();
    Ok(Value::String(lines.join("\n")))
}

/// `value|yesno` or `value|yesno:"yeah,no,maybe"`; nil maps to the third choice
fn yesno(input: &Value, param: &Value) -> Result<Value> {
    let mut choices = ["yes".to_string(), "no".to_string(), "maybe".to_string()];

    let custom = param.to_string();
    if !custom.is_empty() {
        let parts: Vec<&str> = custom.split(',').collect();
        if parts.len() > 3 {
            return Err(Error::type_error(format!(
                "Filter 'yesno' takes at most 3 options (got '{}')",
                custom
            )));
        }
        if parts.len() < 2 {
            return Err(Error::type_error(format!(
                "Filter 'yesno' takes either no or at least 2 options (got '{}')",
                custom
            )));
        }
        for (choice, part) in choices.iter_mut().zip(parts) {
            *choice = part.to_string();
        }
    }

    let [yes, no, maybe] = choices;
    Ok(Value::String(if input.is_nil() {
        maybe
    } else if input.is_true() {
        yes
    } else {
        no
    }))
}

fn float(input: &Value, _: &Value) -> Result<Value> {
    Ok(Value::Float(input.float()))
}

fn integer(input: &Value, _: &Value) -> Result<Value> {
    Ok(Value::Integer(input.integer()))
}
