use livetab_common::DataType;
use livetab_parse::{Arity, Operator, OperatorCatalog, Token};

use super::utils::text_arg;

fn text1(f: fn(&str) -> Token) -> impl Fn(&[Token]) -> Token + Send + Sync + 'static {
    move |args| match text_arg(args, 0) {
        Ok(s) => f(&s),
        Err(e) => Token::Error(e),
    }
}

fn concat(args: &[Token]) -> Token {
    let mut out = String::new();
    for i in 0..args.len() {
        match text_arg(args, i) {
            Ok(s) => out.push_str(&s),
            Err(e) => return Token::Error(e),
        }
    }
    Token::text(out)
}

pub fn register_builtins(cat: &mut OperatorCatalog) {
    let unary: [(&str, fn(&str) -> Token, DataType); 4] = [
        ("len", |s| Token::number(s.chars().count() as f64), DataType::Number),
        ("upper", |s| Token::text(s.to_uppercase()), DataType::Text),
        ("lower", |s| Token::text(s.to_lowercase()), DataType::Text),
        ("trim", |s| Token::text(s.trim()), DataType::Text),
    ];
    for (label, f, returns) in unary {
        cat.insert(
            Operator::function(label, Arity::exactly(1))
                .arg_types([DataType::Any])
                .returns(returns)
                .category("Text")
                .eval_now(text1(f)),
        );
    }
    cat.insert(
        Operator::function("concat", Arity::at_least(1))
            .returns(DataType::Text)
            .category("Text")
            .eval_now(concat),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concat_renders_scalars() {
        assert_eq!(
            concat(&[Token::text("x="), Token::number(1.5), Token::boolean(true)]),
            Token::text("x=1.5true")
        );
        assert_eq!(
            text1(|s| Token::number(s.chars().count() as f64))(&[Token::text("héllo")]),
            Token::number(5.0)
        );
    }
}
