//! Markdown rendering and parsing for recipe export and file import.
//!
//! Multi-recipe exports are the single-recipe documents joined by a `---` rule;
//! [`parse_markdown`] accepts the same layout.

use crate::models::{NewRecipe, Recipe};

const DOCUMENT_SEPARATOR: &str = "\n---\n\n";

/// Render one recipe as a Markdown document.
pub fn render_markdown(recipe: &Recipe) -> String {
    let mut lines: Vec<String> = vec![format!("# {}\n", recipe.name)];

    if let Some(ref description) = recipe.description {
        lines.push(format!("_{}_\n", description));
    }

    let meta: Vec<String> = [
        ("Prep", &recipe.prep_time),
        ("Cook", &recipe.cook_time),
        ("Total", &recipe.total_time),
        ("Servings", &recipe.servings),
        ("Difficulty", &recipe.difficulty),
        ("Cuisine", &recipe.cuisine),
    ]
    .iter()
    .filter_map(|&(label, value)| value.as_ref().map(|v| format!("**{}:** {}", label, v)))
    .collect();
    if !meta.is_empty() {
        lines.push(format!("{}\n", meta.join(" | ")));
    }

    let categories = recipe.category_list();
    if !categories.is_empty() {
        lines.push(format!("**Categories:** {}\n", categories.join(", ")));
    }

    lines.push("## Ingredients\n".to_string());
    lines.extend(recipe.ingredient_lines().iter().map(|l| format!("- {}", l)));
    lines.push(String::new());

    lines.push("## Directions\n".to_string());
    lines.extend(
        recipe
            .direction_lines()
            .iter()
            .enumerate()
            .map(|(i, l)| format!("{}. {}", i + 1, strip_step_number(l))),
    );
    lines.push(String::new());

    if let Some(ref nutrition) = recipe.nutritional_info {
        lines.push("## Nutrition\n".to_string());
        lines.push(format!("{}\n", nutrition));
    }

    if let Some(ref notes) = recipe.notes {
        lines.push("## Notes\n".to_string());
        lines.push(format!("{}\n", notes));
    }

    if let Some(rating) = recipe.rating {
        let rating = rating.min(5) as usize;
        lines.push(format!(
            "**Rating:** {}{}\n",
            "★".repeat(rating),
            "☆".repeat(5 - rating)
        ));
    }

    if let Some(ref source) = recipe.source {
        lines.push(format!("**Source:** {}\n", source));
    }

    lines.join("\n")
}

/// Render several recipes into one document.
pub fn render_collection(recipes: &[Recipe]) -> String {
    recipes
        .iter()
        .map(render_markdown)
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR)
}

#[derive(PartialEq)]
enum Section {
    Header,
    Ingredients,
    Directions,
    Other,
}

/// Parse recipes out of Markdown text. Documents without a `# ` title are skipped.
pub fn parse_markdown(text: &str) -> Vec<NewRecipe> {
    text.split("\n---\n").filter_map(parse_document).collect()
}

fn parse_document(doc: &str) -> Option<NewRecipe> {
    let mut recipe: Option<NewRecipe> = None;
    let mut ingredients = Vec::new();
    let mut directions = Vec::new();
    let mut section = Section::Header;

    for line in doc.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(title) = line.strip_prefix("# ") {
            if recipe.is_none() {
                recipe = Some(NewRecipe::named(title.trim()));
            }
            continue;
        }
        let Some(current) = recipe.as_mut() else {
            continue;
        };

        if let Some(heading) = line.strip_prefix("## ") {
            section = match heading.trim().to_ascii_lowercase().as_str() {
                "ingredients" => Section::Ingredients,
                "directions" | "instructions" | "method" => Section::Directions,
                _ => Section::Other,
            };
            continue;
        }

        // Trailing `**Rating:**` / `**Source:**` lines end the list sections
        if section != Section::Header && line.starts_with("**") {
            if let Some(source) = line.strip_prefix("**Source:**") {
                current.source = Some(source.trim().to_string());
            }
            section = Section::Other;
            continue;
        }

        match section {
            Section::Ingredients => {
                let item = line.trim_start_matches(['-', '*']).trim();
                ingredients.push(item.to_string());
            }
            Section::Directions => directions.push(strip_step_number(line).to_string()),
            Section::Header => parse_header_line(current, line),
            Section::Other => {}
        }
    }

    recipe.map(|mut r| {
        r.ingredients = ingredients.join("\n");
        r.directions = directions.join("\n");
        r
    })
}

fn parse_header_line(recipe: &mut NewRecipe, line: &str) {
    if line.len() > 1 && line.starts_with('_') && line.ends_with('_') {
        recipe.description = Some(line.trim_matches('_').to_string());
        return;
    }
    if let Some(categories) = line.strip_prefix("**Categories:**") {
        recipe.categories = categories
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        return;
    }
    if let Some(source) = line.strip_prefix("**Source:**") {
        recipe.source = Some(source.trim().to_string());
        return;
    }

    for part in line.split(" | ") {
        let Some((label, value)) = part
            .strip_prefix("**")
            .and_then(|rest| rest.split_once(":**"))
        else {
            continue;
        };
        let value = Some(value.trim().to_string());
        match label {
            "Prep" => recipe.prep_time = value,
            "Cook" => recipe.cook_time = value,
            "Total" => recipe.total_time = value,
            "Servings" => recipe.servings = value,
            "Difficulty" => recipe.difficulty = value,
            "Cuisine" => recipe.cuisine = value,
            _ => {}
        }
    }
}

/// Drop a leading `1.`, `2:` or `Step 3.` marker.
fn strip_step_number(line: &str) -> &str {
    let rest = line
        .strip_prefix("Step ")
        .or_else(|| line.strip_prefix("step "))
        .unwrap_or(line);
    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return line;
    }
    match rest[digits..].strip_prefix(['.', ':']) {
        Some(tail) => tail.trim_start(),
        None => line,
    }
}
