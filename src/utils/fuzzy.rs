// Fuzzy matching utilities for name suggestions and list searches

/// Calculate Levenshtein distance between two strings
/// Returns the minimum number of single-character edits (insertions, deletions, substitutions)
/// needed to transform one string into another
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();
    let s1_len = s1_chars.len();
    let s2_len = s2_chars.len();
    
    // Handle empty strings
    if s1_len == 0 {
        return s2_len;
    }
    if s2_len == 0 {
        return s1_len;
    }
    
    // Create matrix
    let mut matrix = vec![vec![0; s2_len + 1]; s1_len + 1];
    
    // Initialize first row and column
    for i in 0..=s1_len {
        matrix[i][0] = i;
    }
    for j in 0..=s2_len {
        matrix[0][j] = j;
    }
    
    // Fill matrix
    for i in 1..=s1_len {
        for j in 1..=s2_len {
            let cost = if s1_chars[i - 1] == s2_chars[j - 1] {
                0
            } else {
                1
            };
            
            matrix[i][j] = (matrix[i - 1][j] + 1)                    // deletion
                .min(matrix[i][j - 1] + 1)                          // insertion
                .min(matrix[i - 1][j - 1] + cost);                  // substitution
        }
    }
    
    matrix[s1_len][s2_len]
}

/// Check if s2 is a substring of s1 (case-insensitive)
pub fn is_substring_match(s1: &str, s2: &str) -> bool {
    s1.to_lowercase().contains(&s2.to_lowercase())
}

/// Find near matches for a name among candidates (companies, dealers, lot codes, stages)
/// Returns up to 5 matches sorted by distance (closest first)
pub fn find_near_matches<S: AsRef<str>>(
    search_name: &str,
    candidates: &[S],
    max_distance: usize,
) -> Vec<(String, usize)> {
    let search_lower = search_name.to_lowercase();
    let mut matches: Vec<(String, usize)> = Vec::new();

    for candidate in candidates {
        let candidate = candidate.as_ref();
        let candidate_lower = candidate.to_lowercase();

        // Calculate Levenshtein distance (case-insensitive)
        let distance = levenshtein_distance(&search_lower, &candidate_lower);

        if distance <= max_distance {
            matches.push((candidate.to_string(), distance));
        } else if search_lower.len() < candidate_lower.len() && is_substring_match(candidate, search_name) {
            // Prefix matches are preferred (distance = extra chars),
            // other substrings get a one-point penalty
            let substring_distance = if candidate_lower.starts_with(&search_lower) {
                candidate_lower.len() - search_lower.len()
            } else {
                candidate_lower.len() - search_lower.len() + 1
            };

            // Be more lenient for substrings, e.g. "acme" -> "acme metals"
            if substring_distance <= max_distance + 2 {
                matches.push((candidate.to_string(), substring_distance.min(max_distance)));
            }
        }
    }

    // Sort by distance, then by name
    matches.sort_by(|a, b| {
        a.1.cmp(&b.1)
            .then_with(|| a.0.cmp(&b.0))
    });

    matches.into_iter().take(5).collect()
}

/// Render a "Did you mean ...?" suffix, empty when nothing is close
pub fn did_you_mean<S: AsRef<str>>(search_name: &str, candidates: &[S]) -> String {
    let matches = find_near_matches(search_name, candidates, 3);
    if matches.is_empty() {
        String::new()
    } else {
        let names: Vec<String> = matches.iter().map(|(name, _)| format!("'{}'", name)).collect();
        format!(" Did you mean {}?", names.join(", "))
    }
}
