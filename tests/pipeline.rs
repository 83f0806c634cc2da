use ifcgraph::graph::{edgelist, ExclusionPolicy, GraphMaterializer, SequentialAllocator};
use ifcgraph::render::{render_html, RenderOptions};
use ifcgraph::step::parse_step;
use ifcgraph::{build_graph, BuildOptions, IfcGraph, IfcModel, ModelDecoder, NodeKey, Schema};
use tempfile::TempDir;

const HOUSE: &str = r#"ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('house.ifc','2024-03-01T12:00:00',('Architect'),('Studio'),'','','');
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCPERSON($,'Doe','Jane',$,$,$,$,$);
#2=IFCORGANIZATION($,'Studio',$,$,$);
#3=IFCPERSONANDORGANIZATION(#1,#2,$);
#4=IFCAPPLICATION(#2,'2.0','Designer','DSG');
#5=IFCOWNERHISTORY(#3,#4,$,.ADDED.,$,$,$,1709294400);
#10=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',#5,'House',$,$,$,$,$,$);
#11=IFCBUILDING('1YvctVUKr0kugbFTf53O9L',#5,'Main </script> block',$,$,$,$,$,.ELEMENT.,$,$,$);
#12=IFCRELAGGREGATES('2YvctVUKr0kugbFTf53O9L',#5,$,$,#10,(#11));
#20=IFCPROPERTYSINGLEVALUE('Height',$,IFCLENGTHMEASURE(2.7),$);
ENDSEC;
END-ISO-10303-21;
"#;

fn house() -> IfcModel {
    let step = parse_step(HOUSE).unwrap();
    IfcModel::new(step, Schema::ifc4_core().unwrap(), false)
}

fn build(options: BuildOptions) -> IfcGraph {
    let model = house();
    let mut graph = IfcGraph::new();
    GraphMaterializer::with_allocator(options, Box::new(SequentialAllocator::default()))
        .build(&mut graph, &model)
        .unwrap();
    graph
}

#[test]
fn every_entity_becomes_exactly_one_node() {
    let model = house();
    let graph = build(BuildOptions::default());
    for id in model.entity_ids() {
        let key = NodeKey::Native(id);
        assert_eq!(graph.nodes().filter(|n| n.id == key).count(), 1, "node {}", id);
    }
    // one extra node for the inline length measure
    assert_eq!(graph.node_count(), model.len() + 1);
}

#[test]
fn compound_fields_never_leak_into_attributes() {
    let graph = build(BuildOptions::default());
    let rel = graph.node(&NodeKey::Native(12)).unwrap();
    assert!(!rel.attributes.contains_key("RelatingObject"));
    assert!(!rel.attributes.contains_key("RelatedObjects"));
    assert!(!rel.attributes.contains_key("OwnerHistory"));
    assert_eq!(rel.attributes["GlobalId"], "2YvctVUKr0kugbFTf53O9L");
}

#[test]
fn owner_history_only_under_project() {
    let history = NodeKey::Native(5);
    let graph = build(BuildOptions::default());
    let sources: Vec<&NodeKey> = graph
        .edges_to(&history)
        .into_iter()
        .filter(|(_, e)| e.kind == "OwnerHistory")
        .map(|(s, _)| s)
        .collect();
    assert_eq!(sources, vec![&NodeKey::Native(10)]);

    let open = build(BuildOptions {
        policy: ExclusionPolicy::none(),
        ..BuildOptions::default()
    });
    assert_eq!(
        open.edges_to(&history)
            .into_iter()
            .filter(|(_, e)| e.kind == "OwnerHistory")
            .count(),
        3
    );
}

#[test]
fn hierarchy_labels_follow_schema() {
    let graph = build_graph(
        &house(),
        BuildOptions {
            include_hierarchy: true,
            ..BuildOptions::default()
        },
    )
    .unwrap();
    let labels = &graph.node(&NodeKey::Native(11)).unwrap().labels;
    assert!(labels.contains(&"IfcRoot".to_string()));
    assert!(labels.contains(&"IfcSpatialStructureElement".to_string()));
    assert_eq!(labels.last().map(String::as_str), Some("IfcBuilding"));
}

#[test]
fn edge_list_round_trip_through_disk() {
    let graph = build(BuildOptions::default());
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("out").join("house.txt");
    edgelist::save(&graph, &path).unwrap();
    let back = edgelist::load(&path).unwrap();

    assert_eq!(
        back.nodes().cloned().collect::<Vec<_>>(),
        graph.nodes().cloned().collect::<Vec<_>>()
    );
    let edges = |g: &IfcGraph| {
        g.edges()
            .map(|(s, t, e)| (s.clone(), t.clone(), e.kind.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(edges(&back), edges(&graph));
}

#[test]
fn rendered_page_escapes_embedded_markup() {
    let graph = build(BuildOptions::default());
    let html = render_html(&graph, &RenderOptions::default()).unwrap();
    assert!(html.contains("vis.Network"));
    assert!(html.contains("IsDecomposedBy"));
    // one closing tag for the loader script, one for the inline script
    assert_eq!(html.matches("</script>").count(), 2);
}
