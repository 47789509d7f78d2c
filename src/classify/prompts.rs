// src/classify/prompts.rs
use crate::classify::oracle::OraclePrompt;
use crate::classify::CategoryTaxonomy;

const SYSTEM_BULK: &str = "You sort trending search terms into topical categories. \
Reply with one JSON object and nothing else.";

const SYSTEM_LABEL: &str = "You are an expert in technology and current events. \
Reply with a single category name and nothing else.";

const SYSTEM_LIST: &str = "You filter trending search terms by topic. \
Reply with a comma-separated list of terms and nothing else.";

fn json_list<S: AsRef<str>>(items: &[S]) -> String {
    let v: Vec<&str> = items.iter().map(|s| s.as_ref()).collect();
    serde_json::to_string(&v).unwrap_or_else(|_| "[]".to_string())
}

/// All terms and the taxonomy in one request; reply is `{category: [terms]}`.
pub fn bulk(terms: &[String], taxonomy: &CategoryTaxonomy) -> OraclePrompt {
    let user = format!(
        "Categories: {cats}\n\
Terms: {terms}\n\n\
Return a JSON object whose keys are category names taken from the list above and \
whose values are arrays of the terms that belong to that category. \
Copy terms exactly as given. Put each term in at most one category. \
Leave out terms that fit no category.",
        cats = json_list(taxonomy.names()),
        terms = json_list(terms),
    );
    OraclePrompt {
        system: SYSTEM_BULK.to_string(),
        user,
    }
}

/// One term; reply is a single category label.
pub fn per_term(term: &str, taxonomy: &CategoryTaxonomy) -> OraclePrompt {
    let user = format!(
        "Categorize this topic into one of these categories: {cats}.\n\
Only return the category. If none fits, return NONE.\n\
Topic: {term:?}",
        cats = json_list(taxonomy.names()),
    );
    OraclePrompt {
        system: SYSTEM_LABEL.to_string(),
        user,
    }
}

/// One category; reply is the comma-separated subset of terms that belong.
pub fn list(category: &str, terms: &[String]) -> OraclePrompt {
    let user = format!(
        "From this list of trending terms, return only those related to {category:?}, \
separated by commas. If none are related, return NONE.\nTerms: {terms}",
        terms = terms.join(", "),
    );
    OraclePrompt {
        system: SYSTEM_LIST.to_string(),
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bulk_prompt_embeds_escaped_terms_and_categories() {
        let tax = CategoryTaxonomy::new(["AI/ML", "Finance"]).unwrap();
        let p = bulk(&["say \"hi\"".to_string()], &tax);
        assert!(p.user.contains(r#"["AI/ML","Finance"]"#));
        assert!(p.user.contains(r#"["say \"hi\""]"#));
    }
}
