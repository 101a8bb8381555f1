use hit_counter_core::stack::api::{is_api_base_url, METHOD_TYPE, STAGE_TYPE};
use hit_counter_core::stack::function::{CodeAsset, FUNCTION_TYPE, PERMISSION_TYPE};
use hit_counter_core::stack::hit_counter::{
    declare_hit_counter, synthesize_hit_counter, HitCounterStackProps,
};
use hit_counter_core::stack::iam::{read_write_data_actions, POLICY_TYPE};
use hit_counter_core::stack::table::TABLE_TYPE;
use hit_counter_core::stack::template::{CfnResource, Template};
use serde_json::{json, Value};

fn props() -> HitCounterStackProps {
    HitCounterStackProps::new(CodeAsset::from_bundle(b"increment_counter bootstrap"))
}

fn template() -> Template {
    synthesize_hit_counter(&props()).expect("hit counter stack should synthesize")
}

fn single<'a>(template: &'a Template, resource_type: &'a str) -> (&'a String, &'a CfnResource) {
    let matches = template.resources_of_type(resource_type).collect::<Vec<_>>();
    assert_eq!(matches.len(), 1, "expected exactly one {resource_type}");
    matches[0]
}

#[test]
fn declares_one_on_demand_table_keyed_by_page_path() {
    let template = template();
    let (_, table) = single(&template, TABLE_TYPE);

    assert_eq!(
        table.properties["KeySchema"],
        json!([{"AttributeName": "pagePath", "KeyType": "HASH"}])
    );
    assert_eq!(
        table.properties["AttributeDefinitions"],
        json!([{"AttributeName": "pagePath", "AttributeType": "S"}])
    );
    assert_eq!(table.properties["BillingMode"], "PAY_PER_REQUEST");
    assert!(table.properties.get("ProvisionedThroughput").is_none());
}

#[test]
fn function_environment_references_the_table() {
    let template = template();
    let (table_id, _) = single(&template, TABLE_TYPE);
    let (_, function) = single(&template, FUNCTION_TYPE);

    assert_eq!(
        function.properties["Environment"]["Variables"],
        json!({"TABLE_NAME": {"Ref": table_id}})
    );
    assert_eq!(function.properties["Timeout"], 10);
    assert_eq!(function.properties["MemorySize"], 128);
    assert_eq!(function.properties["Handler"], "bootstrap");
}

#[test]
fn function_grant_is_read_write_on_the_table_only() {
    let template = template();
    let (table_id, _) = single(&template, TABLE_TYPE);
    let (_, function) = single(&template, FUNCTION_TYPE);
    let (policy_id, policy) = single(&template, POLICY_TYPE);

    let role_id = function.properties["Role"]["Fn::GetAtt"][0]
        .as_str()
        .expect("role should be a GetAtt");
    assert_eq!(policy.properties["Roles"], json!([{"Ref": role_id}]));
    assert!(function.depends_on.contains(policy_id));

    let statements = policy.properties["PolicyDocument"]["Statement"]
        .as_array()
        .expect("statements should be an array");
    assert_eq!(statements.len(), 1);
    let statement = &statements[0];
    assert_eq!(statement["Effect"], "Allow");
    assert_eq!(
        statement["Resource"],
        json!([{"Fn::GetAtt": [table_id, "Arn"]}])
    );

    let actions = statement["Action"]
        .as_array()
        .expect("actions should be an array")
        .iter()
        .filter_map(Value::as_str)
        .collect::<Vec<_>>();
    let allowed = read_write_data_actions();
    assert!(actions.iter().all(|action| allowed.iter().any(|a| a == action)));
    assert!(actions.contains(&"dynamodb:UpdateItem"));
    assert!(actions.contains(&"dynamodb:GetItem"));
}

#[test]
fn exposes_single_post_route_with_preflight() {
    let template = template();
    let (function_id, _) = single(&template, FUNCTION_TYPE);

    let methods = template.resources_of_type(METHOD_TYPE).collect::<Vec<_>>();
    let non_preflight = methods
        .iter()
        .filter(|(_, method)| method.properties["HttpMethod"] != "OPTIONS")
        .collect::<Vec<_>>();
    assert_eq!(non_preflight.len(), 1);

    let (_, post) = non_preflight[0];
    assert_eq!(post.properties["HttpMethod"], "POST");
    assert_eq!(post.properties["Integration"]["Type"], "AWS_PROXY");
    let uri = post.properties["Integration"]["Uri"]["Fn::Join"][1]
        .as_array()
        .expect("uri should be a join");
    assert!(uri.contains(&json!({"Fn::GetAtt": [function_id, "Arn"]})));

    let resource_id = post.properties["ResourceId"]["Ref"]
        .as_str()
        .expect("post should sit on a child resource");
    assert_eq!(
        template.resources[resource_id].properties["PathPart"],
        "incrementCounter"
    );

    let preflight = methods
        .iter()
        .find(|(_, method)| {
            method.properties["HttpMethod"] == "OPTIONS"
                && method.properties["ResourceId"]["Ref"] == resource_id
        })
        .map(|(_, method)| *method)
        .expect("incrementCounter should answer OPTIONS");
    let parameters =
        &preflight.properties["Integration"]["IntegrationResponses"][0]["ResponseParameters"];
    assert_eq!(
        parameters["method.response.header.Access-Control-Allow-Origin"],
        "'*'"
    );
    assert_eq!(
        parameters["method.response.header.Access-Control-Allow-Methods"],
        "'OPTIONS,GET,PUT,POST,DELETE,PATCH,HEAD'"
    );
    assert_eq!(
        parameters["method.response.header.Access-Control-Allow-Headers"],
        "'Content-Type,X-Amz-Date,Authorization,X-Api-Key'"
    );
    assert_eq!(
        parameters["method.response.header.Access-Control-Max-Age"],
        "'86400'"
    );
}

#[test]
fn api_gateway_may_invoke_the_function() {
    let template = template();
    let (function_id, _) = single(&template, FUNCTION_TYPE);
    let permissions = template.resources_of_type(PERMISSION_TYPE).collect::<Vec<_>>();

    assert_eq!(permissions.len(), 2);
    for (_, permission) in permissions {
        assert_eq!(permission.properties["Principal"], "apigateway.amazonaws.com");
        assert_eq!(
            permission.properties["FunctionName"],
            json!({"Fn::GetAtt": [function_id, "Arn"]})
        );
        let arn_parts = permission.properties["SourceArn"]["Fn::Join"][1]
            .as_array()
            .expect("source arn should be a join");
        assert_eq!(
            arn_parts.last(),
            Some(&json!("/POST/incrementCounter"))
        );
    }
}

#[test]
fn api_url_output_points_at_the_stage() {
    let template = template();
    let (stage_id, stage) = single(&template, STAGE_TYPE);
    assert_eq!(stage.properties["StageName"], "prod");

    let output = &template.outputs["ApiUrl"];
    assert_eq!(
        output.description.as_deref(),
        Some("URL of the API Gateway endpoint")
    );
    let parts = output.value["Fn::Join"][1]
        .as_array()
        .expect("api url should be a join");
    assert_eq!(parts.first(), Some(&json!("https://")));
    assert!(parts.contains(&json!({"Ref": stage_id})));
    assert_eq!(parts.last(), Some(&json!("/")));

    assert!(is_api_base_url(
        "https://k3x9q2w1z8.execute-api.eu-west-1.amazonaws.com/prod/"
    ));
}

#[test]
fn table_is_destroyed_with_the_stack() {
    let template = template();
    let (_, table) = single(&template, TABLE_TYPE);
    let rendered = serde_json::to_value(table).expect("table should serialize");

    assert_eq!(rendered["DeletionPolicy"], "Delete");
    assert_eq!(rendered["UpdateReplacePolicy"], "Delete");
    let with_policy = template
        .resources
        .values()
        .filter(|resource| resource.deletion_policy.is_some())
        .count();
    assert_eq!(with_policy, 1);
}

#[test]
fn synthesis_is_deterministic() {
    let first = template().to_pretty_json().expect("template should serialize");
    let second = template().to_pretty_json().expect("template should serialize");
    assert_eq!(first, second);

    let rendered: Value = serde_json::from_str(&first).expect("template should parse");
    assert_eq!(rendered["AWSTemplateFormatVersion"], "2010-09-09");
}

#[test]
fn custom_stage_and_stack_name_flow_through() {
    let mut props = props();
    props.stack_name = "StagingHitCounter".to_string();
    props.stage_name = "staging".to_string();

    let (stack, resources) = declare_hit_counter(&props).expect("stack should declare");
    assert_eq!(stack.name(), "StagingHitCounter");
    let template = stack.synthesize().expect("stack should synthesize");
    assert_eq!(
        template.resources[&resources.stage].properties["StageName"],
        "staging"
    );
    assert_eq!(resources.api_url_output, "ApiUrl");
}

#[test]
fn template_carries_stack_description() {
    let template = template();
    assert_eq!(
        template.description.as_deref(),
        Some(hit_counter_core::stack::hit_counter::STACK_DESCRIPTION)
    );
}
