use crate::types::{AiAnalysis, Category, Language, Manager, Position, Ticket};

/// Skill tag required for premium-segment tickets.
pub const VIP_SKILL: &str = "VIP";

/// Apply the narrowing skill predicates to a manager pool. `pool` holds
/// indices into `managers`; each predicate only narrows, never re-expands.
pub fn eligible_managers(
    pool: &[usize],
    managers: &[Manager],
    ticket: &Ticket,
    analysis: &AiAnalysis,
    home_language: Language,
) -> Vec<usize> {
    let mut eligible = pool.to_vec();

    if ticket.segment.is_premium() {
        eligible.retain(|&i| managers[i].has_skill(VIP_SKILL));
    }
    if analysis.category == Category::DataChange {
        eligible.retain(|&i| managers[i].position == Position::Chief);
    }
    if analysis.language != home_language {
        eligible.retain(|&i| managers[i].has_skill(analysis.language.as_code()));
    }

    eligible
}

/// Human-readable names of the filters that fired, for the reason trail.
pub fn fired_filter_notes(
    ticket: &Ticket,
    analysis: &AiAnalysis,
    home_language: Language,
) -> Vec<String> {
    let mut notes = Vec::new();
    if ticket.segment.is_premium() {
        notes.push("VIP skill".to_string());
    }
    if analysis.category == Category::DataChange {
        notes.push("chief position".to_string());
    }
    if analysis.language != home_language {
        notes.push(format!("{} language skill", analysis.language.as_code()));
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Segment, Sentiment};

    fn manager(id: i64, position: Position, skills: &[&str]) -> Manager {
        Manager {
            id,
            name: format!("manager-{id}"),
            position,
            skills: skills.iter().map(|s| s.to_string()).collect(),
            office_id: 1,
            current_load: 0,
        }
    }

    fn ticket(segment: Segment) -> Ticket {
        Ticket {
            id: 1,
            segment,
            country: None,
            region: None,
            city: None,
            street: None,
            house: None,
            coordinates: None,
        }
    }

    fn analysis(category: Category, language: Language) -> AiAnalysis {
        AiAnalysis {
            id: 1,
            ticket_id: 1,
            category,
            sentiment: Sentiment::Neutral,
            priority: 5,
            language,
            summary: String::new(),
        }
    }

    #[test]
    fn no_filter_fires_for_a_plain_ticket() {
        let managers = vec![manager(1, Position::Specialist, &[]), manager(2, Position::Chief, &[])];
        let eligible = eligible_managers(
            &[0, 1],
            &managers,
            &ticket(Segment::Standard),
            &analysis(Category::Consultation, Language::Ru),
            Language::Ru,
        );
        assert_eq!(eligible, vec![0, 1]);
    }

    #[test]
    fn premium_segment_requires_vip_skill() {
        let managers = vec![
            manager(1, Position::Specialist, &[]),
            manager(2, Position::Specialist, &[VIP_SKILL]),
        ];
        for segment in [Segment::Vip, Segment::Priority] {
            let eligible = eligible_managers(
                &[0, 1],
                &managers,
                &ticket(segment),
                &analysis(Category::Complaint, Language::Ru),
                Language::Ru,
            );
            assert_eq!(eligible, vec![1]);
        }
    }

    #[test]
    fn data_change_requires_chief_position() {
        let managers = vec![
            manager(1, Position::Senior, &[]),
            manager(2, Position::Chief, &[]),
            manager(3, Position::Specialist, &[]),
        ];
        let eligible = eligible_managers(
            &[0, 1, 2],
            &managers,
            &ticket(Segment::Standard),
            &analysis(Category::DataChange, Language::Ru),
            Language::Ru,
        );
        assert_eq!(eligible, vec![1]);
    }

    #[test]
    fn foreign_language_requires_matching_tag() {
        let managers = vec![
            manager(1, Position::Specialist, &["KZ"]),
            manager(2, Position::Specialist, &["ENG"]),
        ];
        let eligible = eligible_managers(
            &[0, 1],
            &managers,
            &ticket(Segment::Standard),
            &analysis(Category::Complaint, Language::Eng),
            Language::Ru,
        );
        assert_eq!(eligible, vec![1]);
    }

    #[test]
    fn filters_compose_and_only_narrow() {
        let managers = vec![
            manager(1, Position::Chief, &[VIP_SKILL, "KZ"]),
            manager(2, Position::Chief, &[VIP_SKILL]),
            manager(3, Position::Specialist, &[VIP_SKILL, "KZ"]),
            manager(4, Position::Chief, &["KZ"]),
        ];
        let eligible = eligible_managers(
            &[0, 1, 2, 3],
            &managers,
            &ticket(Segment::Vip),
            &analysis(Category::DataChange, Language::Kz),
            Language::Ru,
        );
        assert_eq!(eligible, vec![0]);
    }

    #[test]
    fn fired_notes_match_the_firing_filters() {
        let notes = fired_filter_notes(
            &ticket(Segment::Vip),
            &analysis(Category::DataChange, Language::Kz),
            Language::Ru,
        );
        assert_eq!(
            notes,
            vec![
                "VIP skill".to_string(),
                "chief position".to_string(),
                "KZ language skill".to_string(),
            ]
        );
        assert!(fired_filter_notes(
            &ticket(Segment::Standard),
            &analysis(Category::Complaint, Language::Ru),
            Language::Ru,
        )
        .is_empty());
    }
}
