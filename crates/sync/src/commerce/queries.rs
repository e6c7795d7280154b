//! GraphQL operation definitions for the commerce cart API.

use graphql_client::GraphQLQuery;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/schema.graphql",
    query_path = "graphql/queries/cart.graphql",
    response_derives = "Debug, Clone"
)]
pub struct CreateSessionCart;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/schema.graphql",
    query_path = "graphql/queries/cart.graphql",
    response_derives = "Debug, Clone",
    variables_derives = "Debug, Clone",
    fragments_other_variant = "true",
    skip_serializing_none
)]
pub struct AddProductsToCart;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/schema.graphql",
    query_path = "graphql/queries/cart.graphql",
    response_derives = "Debug, Clone",
    variables_derives = "Debug, Clone",
    fragments_other_variant = "true"
)]
pub struct RemoveItemFromCart;

#[derive(GraphQLQuery)]
#[graphql(
    schema_path = "graphql/schema.graphql",
    query_path = "graphql/queries/cart.graphql",
    response_derives = "Debug, Clone",
    variables_derives = "Debug, Clone",
    fragments_other_variant = "true",
    skip_serializing_none
)]
pub struct UpdateCartItems;
