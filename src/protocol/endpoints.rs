// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Production endpoints and client constants of the vendor cloud.

/// Base URL of the device REST API.
pub const API_BASE_URL: &str = "https://api.prod.iot.moen.com/v3";

/// Profile of the authenticated user.
pub const USER_URL: &str = "https://4j1gkf0vji.execute-api.us-east-2.amazonaws.com/prod/v1/users/me";

/// Lambda invoker used for the app-shadow call.
pub const LAMBDA_URL: &str = "https://exo9f857n8.execute-api.us-east-2.amazonaws.com/prod/v1/invoker";

/// OAuth token endpoint.
pub const OAUTH_URL: &str =
    "https://4j1gkf0vji.execute-api.us-east-2.amazonaws.com/prod/v1/oauth2/token";

/// Public OAuth client id of the mobile app.
pub const OAUTH_CLIENT_ID: &str = "6qn9pep31dglq6ed4fvlq6rp5t";

/// User agent sent on unauthenticated calls.
pub const USER_AGENT: &str = "Moen/3 CFNetwork/1408.0.4 Darwin/22.5.0";

/// Lambda function returning the app shadow.
pub const APP_SHADOW_FUNCTION: &str = "smartwater-app-shadow-api-prod-get";

/// Locale sent with the app-shadow call.
pub const LOCALE: &str = "en_US";

/// AWS region of every cloud service.
pub const AWS_REGION: &str = "us-east-2";

/// Cognito identity service host.
pub const COGNITO_HOST: &str = "cognito-identity.us-east-2.amazonaws.com";

/// AWS IoT data endpoint carrying the device shadows.
pub const IOT_ENDPOINT: &str = "a1r2q5ic87novc-ats.iot.us-east-2.amazonaws.com";
