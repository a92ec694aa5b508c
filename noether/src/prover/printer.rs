use super::judgment::{Judgment, JudgmentKind};
use crate::term::{Atom, Substitution, Term};
use std::rc::Rc;

/// One element of a declared surface form: a literal token, or a hole
/// filled by the next argument of the judgment or constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormElement {
    Literal(String),
    Hole,
}

impl FormElement {
    pub fn literal(text: impl Into<String>) -> Self {
        FormElement::Literal(text.into())
    }
}

/// The declared concrete syntax of judgments and term constructors,
/// supplied by the layer that parsed the user's declarations. Returning
/// `None` for a form makes the renderer fall back to raw term syntax.
pub trait SurfaceSyntax {
    fn judgment_form(&self, kind: &JudgmentKind) -> Option<&[FormElement]>;
    fn constructor_form(&self, constant: &str) -> Option<&[FormElement]>;
}

/// Renders a judgment through its declared surface form, substituting
/// subterm renderings into the holes. Free variables render as their bound
/// value when the substitution has one, and as their bare name otherwise.
/// Advisory text only; not machine-parseable and not stable.
pub fn render_judgment(
    judgment: &Judgment,
    sub: &Substitution,
    syntax: &dyn SurfaceSyntax,
) -> String {
    let form = match syntax.judgment_form(judgment.kind()) {
        Some(form) => form,
        None => return judgment.term().to_string(),
    };
    let Term::App { args, .. } = &**judgment.term() else {
        return judgment.term().to_string();
    };

    let mut parts = Vec::with_capacity(form.len());
    let mut index = 0;
    for element in form {
        match element {
            FormElement::Literal(text) => parts.push(text.clone()),
            FormElement::Hole => {
                if let Some(arg) = args.get(index) {
                    parts.push(render_term(arg, sub, syntax));
                }
                index += 1;
            }
        }
    }
    parts.join(" ")
}

fn render_term(term: &Rc<Term>, sub: &Substitution, syntax: &dyn SurfaceSyntax) -> String {
    match &**term {
        Term::Const(c) => match syntax.constructor_form(c.name()) {
            Some(form) => form
                .iter()
                .filter_map(|e| match e {
                    FormElement::Literal(text) => Some(text.as_str()),
                    FormElement::Hole => None,
                })
                .collect::<Vec<_>>()
                .join(" "),
            None => c.name().to_owned(),
        },
        Term::Var(v) => match sub.get_substituted(v) {
            Some(bound) => render_term(&bound, sub, syntax),
            None => v.name().to_owned(),
        },
        Term::App { head: Atom::Const(c), args } => {
            match syntax.constructor_form(c.name()) {
                Some(form) => {
                    let mut parts = Vec::with_capacity(form.len());
                    let mut index = 0;
                    for element in form {
                        match element {
                            FormElement::Literal(text) => parts.push(text.clone()),
                            FormElement::Hole => {
                                if let Some(arg) = args.get(index) {
                                    parts.push(render_term(arg, sub, syntax));
                                }
                                index += 1;
                            }
                        }
                    }
                    format!("({})", parts.join(" "))
                }
                None => term.to_string(),
            }
        }
        Term::App { .. } | Term::Bound(_) | Term::Abs { .. } => term.to_string(),
    }
}
