//! Filter expressions
//!
//! A [`Filter`] is a conjunction of terms. Each term is a comparison
//! (`Field eq 'value'`) or a parenthesised disjunction of nested filters.
//! Single quotes inside values are doubled, as OData requires.

/// One conjunct
#[derive(Debug, Clone, PartialEq, Eq)]
enum Term {
    Compare {
        field: String,
        op: &'static str,
        value: String,
    },
    AnyOf(Vec<Filter>),
}

/// Conjunction of terms
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    terms: Vec<Term>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `field eq 'value'`
    pub fn eq(self, field: &str, value: &str) -> Self {
        self.compare(field, "eq", value)
    }

    /// `field ne 'value'`
    pub fn ne(self, field: &str, value: &str) -> Self {
        self.compare(field, "ne", value)
    }

    /// `(a or b or ...)`; an empty list adds nothing
    pub fn any_of(mut self, alternatives: Vec<Filter>) -> Self {
        let alternatives: Vec<Filter> = alternatives
            .into_iter()
            .filter(|f| !f.is_empty())
            .collect();
        if !alternatives.is_empty() {
            self.terms.push(Term::AnyOf(alternatives));
        }
        self
    }

    fn compare(mut self, field: &str, op: &'static str, value: &str) -> Self {
        self.terms.push(Term::Compare {
            field: field.to_string(),
            op,
            value: value.to_string(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Render as a `$filter` expression
    pub fn render(&self) -> String {
        self.terms
            .iter()
            .map(|term| match term {
                Term::Compare { field, op, value } => {
                    format!("{} {} '{}'", field, op, value.replace('\'', "''"))
                }
                Term::AnyOf(alternatives) => {
                    let rendered: Vec<String> = alternatives
                        .iter()
                        .map(|alt| {
                            if alt.terms.len() > 1 {
                                format!("({})", alt.render())
                            } else {
                                alt.render()
                            }
                        })
                        .collect();
                    format!("({})", rendered.join(" or "))
                }
            })
            .collect::<Vec<_>>()
            .join(" and ")
    }
}

/// Filter plus optional field selection
#[derive(Debug, Clone, Default)]
pub struct Query {
    pub filter: Filter,
    pub select: Vec<&'static str>,
}

impl Query {
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            select: Vec::new(),
        }
    }

    pub fn select(mut self, fields: &[&'static str]) -> Self {
        self.select = fields.to_vec();
        self
    }

    /// Query-string pairs for the first page request
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if !self.filter.is_empty() {
            params.push(("$filter", self.filter.render()));
        }
        if !self.select.is_empty() {
            params.push(("$select", self.select.join(",")));
        }
        params.push(("$format", "json".to_string()));
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conjunction() {
        let filter = Filter::new()
            .eq("CompanyCode", "1000")
            .ne("SalesOrder", "");
        assert_eq!(filter.render(), "CompanyCode eq '1000' and SalesOrder ne ''");
    }

    #[test]
    fn test_quote_doubling() {
        let filter = Filter::new().eq("Customer", "O'Brien");
        assert_eq!(filter.render(), "Customer eq 'O''Brien'");
    }

    #[test]
    fn test_disjunction_group() {
        let filter = Filter::new().eq("SalesDocument", "500").any_of(vec![
            Filter::new().eq("SalesDocumentItem", "10"),
            Filter::new().eq("SalesDocumentItem", "20"),
        ]);
        assert_eq!(
            filter.render(),
            "SalesDocument eq '500' and (SalesDocumentItem eq '10' or SalesDocumentItem eq '20')"
        );
    }

    #[test]
    fn test_params_include_select_and_format() {
        let query = Query::new(Filter::new().eq("BillingDocument", "9001"))
            .select(&["BillingDocument", "AccountingDocument"]);
        let params = query.params();
        assert_eq!(params[0], ("$filter", "BillingDocument eq '9001'".to_string()));
        assert_eq!(params[1], ("$select", "BillingDocument,AccountingDocument".to_string()));
        assert_eq!(params[2], ("$format", "json".to_string()));
    }
}
