//! Load ordering for the Olio dataset.

use loader_framework::DependencyGraph;

use crate::entities::{address, attendees, comments, event_tag, friends, invitation, person, social_event, tag};

/// Entities whose post-load steps run, in order.
///
/// Tag goes first: its reference counts read the event-tag links.
pub const POST_LOAD_ORDER: &[&str] = &[
    tag::ENTITY,
    address::ENTITY,
    person::ENTITY,
    social_event::ENTITY,
    comments::ENTITY,
    invitation::ENTITY,
];

/// The Olio entity dependency graph.
///
/// Users, addresses and invitations sample the loaded user count; event
/// tags sample the tag vocabulary; everything attached to an event samples
/// the event count.
pub fn olio_graph() -> DependencyGraph {
    let mut graph = DependencyGraph::new();
    graph
        .add_entity(person::ENTITY)
        .add_entity(tag::ENTITY)
        .add_dependency(friends::ENTITY, person::ENTITY)
        .add_dependency(address::ENTITY, person::ENTITY)
        .add_dependency(invitation::ENTITY, person::ENTITY)
        .add_dependency(social_event::ENTITY, person::ENTITY)
        .add_dependency(event_tag::ENTITY, tag::ENTITY)
        .add_dependency(event_tag::ENTITY, social_event::ENTITY)
        .add_dependency(attendees::ENTITY, social_event::ENTITY)
        .add_dependency(comments::ENTITY, social_event::ENTITY);
    graph
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages() {
        let stages = olio_graph().stages().unwrap();
        assert_eq!(
            stages,
            vec![
                vec!["Person", "Tag"],
                vec!["Friends", "Address", "Invitation", "SocialEvent"],
                vec!["EventTag", "Attendees", "Comments"],
            ]
        );
    }

    #[test]
    fn test_reference_order_is_valid() {
        let graph = olio_graph();
        let order = [
            "Person",
            "Friends",
            "Address",
            "Invitation",
            "Tag",
            "SocialEvent",
            "EventTag",
            "Attendees",
            "Comments",
        ];
        assert_eq!(graph.violation(&order), None);
        assert_eq!(
            graph.violation(&["Person", "Tag", "EventTag", "SocialEvent"]),
            Some(("EventTag", "SocialEvent"))
        );
    }

    #[test]
    fn test_post_load_order_covers_known_entities() {
        let graph = olio_graph();
        assert!(POST_LOAD_ORDER.iter().all(|e| graph.contains(e)));
        assert_eq!(POST_LOAD_ORDER[0], "Tag");
    }
}
